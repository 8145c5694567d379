//! Built-in value catalogs for synthetic mutations

use rand::seq::SliceRandom;
use rand::Rng;

const TIME_ZONES: [&str; 17] = [
    "Europe/Berlin",
    "America/Chicago",
    "GMT",
    "America/New_York",
    "America/Los_Angeles",
    "Asia/Kolkata",
    "UTC",
    "America/Puerto_Rico",
    "America/Denver",
    "America/Anchorage",
    "Pacific/Honolulu",
    "Australia/Sydney",
    "Australia/Adelaide",
    "Australia/Perth",
    "Europe/Helsinki",
    "Europe/Moscow",
    "Pacific/Auckland",
];

const FIRST_NAMES: [&str; 16] = [
    "Ada", "Alan", "Barbara", "Claude", "Dennis", "Edsger", "Frances", "Grace", "Hedy", "Ken",
    "Linus", "Margaret", "Niklaus", "Radia", "Sophie", "Tim",
];

const LAST_NAMES: [&str; 16] = [
    "Allen", "Berners-Lee", "Dijkstra", "Hamilton", "Hopper", "Kay", "Lamarr", "Liskov",
    "Lovelace", "Perlman", "Ritchie", "Shannon", "Thompson", "Torvalds", "Turing", "Wirth",
];

/// Time zones users may switch to
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeZoneCatalog;

impl TimeZoneCatalog {
    /// Every zone, in catalog order
    #[inline]
    #[must_use]
    pub fn all() -> &'static [&'static str] {
        &TIME_ZONES
    }

    /// Whether `zone` is in the catalog
    #[must_use]
    pub fn contains(zone: &str) -> bool {
        TIME_ZONES.contains(&zone)
    }

    /// Pick a zone at random
    pub fn choose<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
        TIME_ZONES.choose(rng).copied().unwrap_or("UTC")
    }
}

/// Random "First Last" display name
pub fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Ada");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Lovelace");
    format!("{first} {last}")
}
