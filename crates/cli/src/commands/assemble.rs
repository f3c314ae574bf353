//! `proctor assemble`: Assemble exam segments from a fixture.

use chrono::Duration;
use proctor_assembly::{AssemblyOptions, Collaborators, SegmentAssembler};
use proctor_config::AppConfig;
use proctor_core::clock::SystemClock;
use proctor_core::exam::Exam;
use proctor_core::provider::SegmentStore;
use proctor_store::{FileSegmentStore, Fixture, InMemorySegmentStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub async fn run(
    fixture: Option<PathBuf>,
    exam_id: Option<String>,
    store: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let fixture_path = fixture
        .or_else(|| config.fixtures.path.clone())
        .ok_or("No fixture given: pass --fixture or set fixtures.path")?;
    let fixture = Fixture::load(&fixture_path)?;

    let exams: Vec<&Exam> = match &exam_id {
        Some(id) => vec![
            fixture
                .exam(id)
                .ok_or_else(|| format!("Exam {id} not found in {}", fixture_path.display()))?,
        ],
        None => fixture.exams.iter().collect(),
    };
    if exams.is_empty() {
        return Err(format!("No exams in {}", fixture_path.display()).into());
    }

    let store: Arc<dyn SegmentStore> = match store.or_else(|| config.store.path.clone()) {
        Some(path) => Arc::new(FileSegmentStore::open(path)),
        None => Arc::new(InMemorySegmentStore::new()),
    };
    debug!(store = store.name(), exams = exams.len(), "Segment store ready");

    let (assessments, accommodations) = fixture.providers();
    let assembler = SegmentAssembler::new(
        Collaborators {
            assessments: Arc::new(assessments),
            accommodations: Arc::new(accommodations),
            store: Arc::clone(&store),
            clock: Arc::new(SystemClock),
        },
        AssemblyOptions {
            cache_idle_ttl: Duration::hours(config.cache.idle_ttl_hours),
            language_accommodation_type: config.assembly.language_accommodation_type.clone(),
        },
    );

    eprintln!(
        "📋 Assembling {} exam(s) from {} into {} store",
        exams.len(),
        fixture_path.display(),
        store.name()
    );

    let mut outcomes = Vec::with_capacity(exams.len());
    for exam in exams {
        match assembler.assemble_by_key(exam).await {
            Ok(outcome) => {
                eprintln!(
                    "   ✅ {}: {} segments, {} field test groups, {} items",
                    exam.id,
                    outcome.segments.len(),
                    outcome.field_test_groups.len(),
                    outcome.total_items
                );
                outcomes.push(outcome);
            }
            Err(e) => {
                eprintln!("   ❌ {}: {e}", exam.id);
                return Err(e.into());
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(())
}
