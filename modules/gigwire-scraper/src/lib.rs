//! Mock scraper — generates plausible event records without touching any
//! external source. Stands in for real scrapers in scheduled ingest runs and
//! end-to-end tests; also provides deliberately bad fixtures so the
//! quarantine path can be exercised on demand.

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use rand::prelude::*;

use gigwire_common::{AgeRestriction, RawEventRecord};

pub const SOURCE_NAME: &str = "mock_scraper";
pub const SOURCE_VERSION: &str = "mock_v1.0.0";

const VENUE_POOL: std::ops::RangeInclusive<i64> = 1..=10;
const GENRE_POOL: std::ops::RangeInclusive<i64> = 1..=11;
const ARTIST_POOL: std::ops::RangeInclusive<i64> = 1..=20;

const EVENT_NAMES: &[&str] = &[
    "Techno Night @ Venue{venue}",
    "House Music Festival",
    "Underground Beats",
    "Electronic Sunset Sessions",
    "Bass & Breaks",
    "Ambient Soundscapes",
    "Trance Journey",
    "Deep House Sessions",
    "Drum & Bass Takeover",
    "Minimal Techno Showcase",
];

const PRICE_MIN_CENTS: &[i64] = &[1000, 1500, 2000, 2500, 3000];
const PRICE_SPREAD_CENTS: &[i64] = &[0, 1000, 2000];

/// Generate `count` random events dated 1-30 days after today.
pub fn generate_events(count: usize) -> Vec<RawEventRecord> {
    generate_events_on(Utc::now().date_naive(), count)
}

/// Deterministic-date variant: events land 1-30 days after `today`.
pub fn generate_events_on(today: NaiveDate, count: usize) -> Vec<RawEventRecord> {
    let mut rng = rand::rng();
    (0..count).map(|i| random_event(&mut rng, today, i)).collect()
}

fn random_event(rng: &mut impl Rng, today: NaiveDate, index: usize) -> RawEventRecord {
    let event_date = today + Duration::days(rng.random_range(1..=30));

    let start_hour = rng.random_range(18..=23u32);
    let start_time = NaiveTime::from_hms_opt(start_hour, 0, 0).expect("valid start hour");

    // Same-day model: sets that would run past midnight get clamped.
    let end_hour = start_hour + rng.random_range(3..=5);
    let end_time = if end_hour >= 24 {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(end_hour, 0, 0)
    };

    let is_free = rng.random_bool(0.2);
    let (price_min_cents, price_max_cents) = if is_free {
        (None, None)
    } else {
        let min = PRICE_MIN_CENTS[rng.random_range(0..PRICE_MIN_CENTS.len())];
        let max = min + PRICE_SPREAD_CENTS[rng.random_range(0..PRICE_SPREAD_CENTS.len())];
        (Some(min), Some(max))
    };

    let venue_id = rng.random_range(VENUE_POOL);
    let name_template = EVENT_NAMES[rng.random_range(0..EVENT_NAMES.len())];
    let event_name = name_template.replace("{venue}", &venue_id.to_string());

    let age_restriction = match rng.random_range(0..3) {
        0 => AgeRestriction::AllAges,
        1 => AgeRestriction::EighteenPlus,
        _ => AgeRestriction::TwentyOnePlus,
    };

    let genre_count = rng.random_range(1..=3);
    let artist_count = rng.random_range(1..=4);

    RawEventRecord {
        venue_id,
        event_date,
        start_time,
        end_time,
        event_name: Some(event_name),
        price_min_cents,
        price_max_cents,
        is_free,
        description: Some(format!(
            "Mock event {} for testing purposes. Join us for an amazing night of electronic music!",
            index + 1
        )),
        age_restriction,
        ticket_url: (!is_free)
            .then(|| format!("https://example.com/tickets/event-{}", index + 1)),
        event_url: Some(format!("https://example.com/events/event-{}", index + 1)),
        image_url: Some(format!("https://picsum.photos/seed/event{}/800/600", index + 1)),
        genre_ids: sample_distinct(rng, GENRE_POOL, genre_count),
        artist_ids: sample_distinct(rng, ARTIST_POOL, artist_count),
    }
}

fn sample_distinct(
    rng: &mut impl Rng,
    pool: std::ops::RangeInclusive<i64>,
    n: usize,
) -> Vec<i64> {
    let mut ids: Vec<i64> = pool.collect();
    ids.shuffle(rng);
    ids.truncate(n);
    ids
}

/// One fixture per audit rule, relative to `today`. Each has a distinct
/// fingerprint so they can be ingested together.
pub fn bad_event_fixtures(today: NaiveDate) -> Vec<RawEventRecord> {
    let time = |h, m, s| NaiveTime::from_hms_opt(h, m, s).expect("valid fixture time");

    let mut past = RawEventRecord::new(1, today - Duration::days(30), time(20, 0, 0));
    past.event_name = Some("Past Event (Should Be Quarantined)".to_string());
    past.end_time = Some(time(23, 0, 0));
    past.price_min_cents = Some(2000);

    let mut inverted = RawEventRecord::new(1, today + Duration::days(5), time(23, 0, 0));
    inverted.event_name = Some("Temporal Violation (Should Be Quarantined)".to_string());
    inverted.end_time = Some(time(20, 0, 0));
    inverted.price_min_cents = Some(2000);

    let mut far_future = RawEventRecord::new(1, today + Duration::days(200), time(20, 0, 0));
    far_future.event_name = Some("Too Far Future (Should Be Quarantined)".to_string());
    far_future.end_time = Some(time(23, 0, 0));
    far_future.price_min_cents = Some(2000);

    let mut free_with_price = RawEventRecord::new(1, today + Duration::days(5), time(20, 0, 0));
    free_with_price.event_name = Some("Free Event With Price (Should Be Quarantined)".to_string());
    free_with_price.end_time = Some(time(23, 0, 0));
    free_with_price.is_free = true;
    free_with_price.price_min_cents = Some(2000);

    vec![past, inverted, far_future, free_with_price]
}
