use std::fmt;

use arco_core::SessionTracker;
use arco_core::model::{
    Arrow, AssessmentCategory, HitPoint, OwnerId, SelfAssessmentDraft, SessionConfigDraft,
};
use chrono::{DateTime, Duration, Utc};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    owner: OwnerId,
    sessions: u32,
    series: u32,
    arrows: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidOwner { raw: String },
    InvalidCount { flag: &'static str, raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidOwner { raw } => write!(f, "invalid --owner value (expected UUID): {raw}"),
            ArgsError::InvalidCount { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn count(flag: &'static str, value: String) -> Result<u32, ArgsError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ArgsError::InvalidCount { flag, raw: value }),
    }
}

fn env_count(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("ARCO_DB_URL").unwrap_or_else(|_| "sqlite:arco.sqlite3".into());
        let mut owner = match std::env::var("ARCO_OWNER") {
            Ok(raw) => raw
                .parse::<OwnerId>()
                .map_err(|_| ArgsError::InvalidOwner { raw })?,
            Err(_) => OwnerId::random(),
        };
        let mut sessions = env_count("ARCO_SEED_SESSIONS", 5);
        let mut series = 6;
        let mut arrows = 6;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--owner" => {
                    let value = require_value(&mut args, "--owner")?;
                    owner = value
                        .parse::<OwnerId>()
                        .map_err(|_| ArgsError::InvalidOwner { raw: value.clone() })?;
                }
                "--sessions" => sessions = count("--sessions", require_value(&mut args, "--sessions")?)?,
                "--series" => series = count("--series", require_value(&mut args, "--series")?)?,
                "--arrows" => arrows = count("--arrows", require_value(&mut args, "--arrows")?)?,
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            owner,
            sessions,
            series,
            arrows,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:arco.sqlite3)");
    eprintln!("  --owner <uuid>            Owner of the seeded sessions (default: random)");
    eprintln!("  --sessions <n>            Number of sessions to insert (default: 5)");
    eprintln!("  --series <n>              Series per session (default: 6)");
    eprintln!("  --arrows <n>              Arrows per series (default: 6)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ARCO_DB_URL, ARCO_OWNER, ARCO_SEED_SESSIONS, RUST_LOG");
}

/// Deterministic impact spread: later sessions group tighter.
fn demo_hit(session: u32, series: u32, arrow: u32) -> HitPoint {
    let spread = 60.0 - f64::from(session.min(5)) * 8.0;
    let angle = f64::from(session * 31 + series * 17 + arrow * 53) * 0.7;
    let radius = spread * f64::from((series * 7 + arrow * 3 + session) % 5) / 4.0;
    HitPoint::new(140.0 + radius * angle.cos(), 140.0 + radius * angle.sin())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    for i in 0..args.sessions {
        let created_at = now - Duration::days(i64::from(args.sessions - i) * 3);
        let draft = SessionConfigDraft::new(created_at.date_naive())
            .with_series(args.series, args.arrows)
            .with_distance(18 + 12 * (i % 3))
            .with_goal(Some(args.series * args.arrows * 8));

        let mut tracker = SessionTracker::start(draft, args.owner, created_at)?;
        for s in 0..args.series {
            for a in 0..args.arrows {
                tracker.register_arrow(Arrow::at(demo_hit(i, s, a)))?;
            }
            tracker.advance_to_next_series()?;
        }

        let assessment = AssessmentCategory::ALL
            .into_iter()
            .enumerate()
            .fold(SelfAssessmentDraft::default(), |draft, (k, category)| {
                let k = u32::try_from(k).unwrap_or(0);
                let rating = 4 + (i + k) % 6;
                draft.with(category, u8::try_from(rating).unwrap_or(5))
            })
            .validate()?;
        let session = tracker.finalize(Some(format!("Demo session {}", i + 1)), Some(assessment))?;

        let id = storage.insert_full_session(session).await?;
        log::info!("seeded session {id} with total {}", session.total_score());
    }

    println!(
        "Seeded {} sessions for owner {} into {}",
        args.sessions, args.owner, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
