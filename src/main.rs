use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use arena_registry::attachments::AttachmentPipeline;
use arena_registry::cache::CacheStore;
use arena_registry::config::Config;
use arena_registry::domain::{
    Academy, AthleteModality, BeltRank, Event, EventModality, Registration, Sex,
};
use arena_registry::form::RegistrationFormModel;
use arena_registry::logging;
use arena_registry::object_store::{HttpObjectStore, InMemoryObjectStore, ObjectStore};
use arena_registry::poomsae::PoomsaeTable;
use arena_registry::portal::PortalService;
use arena_registry::store::InMemoryStore;

#[derive(Parser)]
#[command(name = "arena-registry")]
#[command(about = "Event registration portal core for taekwondo federations")]
#[command(version = "0.1.0")]
struct Cli {
    /// JSON fixture with events/registrations/academies to work against
    #[arg(long, global = true)]
    data: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events with participation counts
    Events,
    /// Show the categorized, modality-split roster for one event
    Roster {
        #[arg(long)]
        event: Uuid,
    },
    /// List academies with participation counts
    Academies,
    /// Show overall portal statistics
    Stats,
    /// Export the portal collections as a JSON backup
    Export {
        #[arg(long)]
        output: String,
    },
    /// Seed sample data and walk through a registration + attachment flow
    Demo,
}

/// On-disk collection dump consumed by --data and produced by export.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PortalFixture {
    events: Vec<Event>,
    registrations: Vec<Registration>,
    academies: Vec<Academy>,
}

fn load_fixture(path: &str, store: &InMemoryStore) -> anyhow::Result<()> {
    let content = fs::read_to_string(path)?;
    let fixture: PortalFixture = serde_json::from_str(&content)?;
    info!(
        "Loaded fixture: {} events, {} registrations, {} academies",
        fixture.events.len(),
        fixture.registrations.len(),
        fixture.academies.len()
    );
    store.seed(fixture.events, fixture.registrations, fixture.academies);
    Ok(())
}

fn build_portal(config: &Config, store: Arc<InMemoryStore>) -> PortalService {
    let object_store: Arc<dyn ObjectStore> = match (&config.storage.endpoint, &config.storage.bucket)
    {
        (Some(endpoint), Some(bucket)) => match std::env::var("ARENA_STORAGE_KEY") {
            Ok(key) => Arc::new(HttpObjectStore::new(endpoint.clone(), bucket.clone(), key)),
            Err(_) => {
                error!("ARENA_STORAGE_KEY not set; falling back to in-memory object store");
                Arc::new(InMemoryObjectStore::new())
            }
        },
        _ => Arc::new(InMemoryObjectStore::new()),
    };

    let pipeline = AttachmentPipeline::new(object_store)
        .with_upload_timeout(std::time::Duration::from_secs(
            config.storage.upload_timeout_secs,
        ))
        .with_inline_ceiling(config.storage.inline_ceiling_bytes);
    let cache = CacheStore::with_ttl(std::time::Duration::from_secs(config.cache.admin_ttl_secs));
    let poomsae = PoomsaeTable::load_or_default(config.poomsae_table.as_deref());

    PortalService::new(store, cache, pipeline, poomsae)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        info!("Using default configuration: {}", e);
        Config::default()
    });

    let store = Arc::new(InMemoryStore::new());
    if let Some(path) = &cli.data {
        load_fixture(path, &store)?;
    }
    let portal = build_portal(&config, store.clone());
    let today = chrono::Utc::now().date_naive();

    match cli.command {
        Commands::Events => {
            let events = portal.events_with_counts().await?;
            println!("\n📋 Events ({}):", events.len());
            for entry in events {
                println!(
                    "   {}  {}  [{}]  {} athletes from {} academies",
                    entry.event.date,
                    entry.event.name,
                    entry.event.city,
                    entry.total_athletes,
                    entry.total_academies
                );
            }
        }
        Commands::Roster { event } => {
            let roster = portal.event_roster(event, today).await?;
            println!("\n🥋 KYORUGI ({} athletes):", roster.kyorugi.len());
            for entry in &roster.kyorugi {
                println!(
                    "   {} [{}]  {}  {}  {}  {}",
                    entry.athlete.full_name(),
                    entry.academy_abbreviation,
                    entry.category.age_division,
                    entry.athlete.belt.label(),
                    entry.category.belt_level,
                    entry
                        .category
                        .weight_class
                        .map(|c| c.to_string())
                        .unwrap_or_default()
                );
            }
            println!("\n🧘 POOMSAE ({} athletes):", roster.poomsae.len());
            for entry in &roster.poomsae {
                println!(
                    "   {} [{}]  {}  {}  {}",
                    entry.athlete.full_name(),
                    entry.academy_abbreviation,
                    entry.category.age_division,
                    entry.athlete.belt.label(),
                    entry.category.poomsae_form.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Academies => {
            let academies = portal.academies_with_counts().await?;
            println!("\n🏫 Academies ({}):", academies.len());
            for entry in academies {
                println!(
                    "   {} ({})  {} events, {} athletes enrolled",
                    entry.academy.name,
                    entry.academy.abbreviation,
                    entry.events_participated,
                    entry.total_athletes_enrolled
                );
            }
        }
        Commands::Stats => {
            let stats = portal.overall_stats(today).await?;
            println!("\n📊 Portal statistics:");
            println!("   Academies:       {}", stats.total_academies);
            println!("   Events:          {}", stats.total_events);
            println!("   Upcoming events: {}", stats.upcoming_events);
            println!("   Athletes:        {}", stats.total_athletes);
        }
        Commands::Export { output } => {
            let snapshot = portal.load_portal_data().await?;
            let fixture = PortalFixture {
                events: snapshot.events,
                registrations: snapshot.registrations,
                academies: snapshot.academies,
            };
            fs::write(&output, serde_json::to_string_pretty(&fixture)?)?;
            println!("✅ Exported portal data to {}", output);
        }
        Commands::Demo => {
            run_demo(&portal, today).await?;
        }
    }

    Ok(())
}

/// Seeds one academy and one event, registers two athletes, attaches a
/// rulebook, and prints the resulting aggregates.
async fn run_demo(portal: &PortalService, today: chrono::NaiveDate) -> anyhow::Result<()> {
    println!("🔄 Running portal demo...");

    let now = chrono::Utc::now();
    let mut academy = Academy {
        id: None,
        name: "Academia Koryo Lima".to_string(),
        abbreviation: "KORYO".to_string(),
        representative: "Marta Salas".to_string(),
        representative_national_id: "40404040".to_string(),
        phone: Some("+51 999 111 222".to_string()),
        email: "contacto@koryolima.pe".to_string(),
        created_at: now,
    };
    portal.register_academy(&mut academy).await?;
    let academy_id = academy.id.expect("academy id assigned on create");

    let mut event = Event {
        id: None,
        name: "Campeonato Nacional Apertura".to_string(),
        date: today + chrono::Duration::days(60),
        registration_deadline: Some(today + chrono::Duration::days(45)),
        country: "Peru".to_string(),
        city: "Lima".to_string(),
        venue: "Polideportivo Villa El Salvador".to_string(),
        modality: EventModality::Both,
        description: "Apertura de la temporada nacional".to_string(),
        image: None,
        rulebook_pdf: None,
        rulebook_name: None,
        created_by: academy_id,
        created_at: now,
        updated_at: now,
    };
    portal.save_event(&mut event, today).await?;
    let event_id = event.id.expect("event id assigned on create");

    let mut form = RegistrationFormModel::new(event_id, academy_id);
    {
        let draft = form.draft_mut();
        draft.first_name = "Lucia".to_string();
        draft.last_name = "Huaman".to_string();
        draft.national_id = "70707070".to_string();
        draft.birth_date = chrono::NaiveDate::from_ymd_opt(2009, 3, 14);
        draft.sex = Some(Sex::Female);
        draft.belt = Some(BeltRank::Kup(4));
        draft.modality = Some(AthleteModality::Kyorugi);
        draft.weight_kg = Some(51.3);
    }
    form.add_entry(portal.poomsae_table(), today)?;
    {
        let draft = form.draft_mut();
        draft.first_name = "Diego".to_string();
        draft.last_name = "Paredes".to_string();
        draft.national_id = "71717171".to_string();
        draft.birth_date = chrono::NaiveDate::from_ymd_opt(2006, 11, 2);
        draft.sex = Some(Sex::Male);
        draft.belt = Some(BeltRank::Dan(1));
        draft.modality = Some(AthleteModality::Poomsae);
    }
    portal.submit_registration(&mut form, today).await?;
    println!("✅ Registered {} athletes", form.entry_count());

    let rulebook = vec![0x25u8; 64 * 1024];
    let outcome = portal
        .attach_rulebook(event_id, "bases-apertura.pdf", &rulebook)
        .await?;
    println!("📎 Rulebook stored via {:?}", outcome.stage);

    let events = portal.events_with_counts().await?;
    for entry in events {
        println!(
            "📋 {}: {} athletes from {} academies",
            entry.event.name, entry.total_athletes, entry.total_academies
        );
    }

    let roster = portal.event_roster(event_id, today).await?;
    println!(
        "🥋 Roster: {} kyorugi / {} poomsae",
        roster.kyorugi.len(),
        roster.poomsae.len()
    );

    Ok(())
}
