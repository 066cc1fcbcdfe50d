//! End-to-end scenarios against real files in a temporary data directory.
//!
//! Each test wires the stores the way the plugin does (through the
//! coordinator and the file loader) and checks both the in-memory state and
//! what ends up on disk.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cnc_suite::catalog::MaterialCatalogStore;
use cnc_suite::config::SuiteConfig;
use cnc_suite::coordinator::InitializationCoordinator;
use cnc_suite::filter::{ElementFilter, PageRequest};
use cnc_suite::host::{HostDocument, InMemoryDocument};
use cnc_suite::models::{Element, ElementStatus, ElementType, Material, MaterialType};
use cnc_suite::notify::ElementChange;
use cnc_suite::outliner::ElementOutlinerStore;
use cnc_suite::palette::MaterialPalette;
use cnc_suite::view::{element_rows, UNKNOWN_MATERIAL};
use tempfile::TempDir;

fn coordinator(tmp: &TempDir) -> InitializationCoordinator {
    InitializationCoordinator::from_storage(SuiteConfig::with_data_dir(tmp.path()).storage)
}

fn read_json(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ─── Cold start ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_cold_start_creates_both_files() {
    let tmp = TempDir::new().unwrap();
    let services = coordinator(&tmp).ensure_ready().await.unwrap();

    assert!(services.catalog.len() >= 1);
    assert!(services.outliner.is_empty());

    let materials = read_json(&tmp.path().join("materials.json"));
    assert_eq!(materials.as_array().unwrap().len(), services.catalog.len());
    let elements = read_json(&tmp.path().join("elements.json"));
    assert_eq!(elements, serde_json::json!([]));
}

#[tokio::test]
async fn test_cold_start_fires_reload_events() {
    let tmp = TempDir::new().unwrap();
    let storage = SuiteConfig::with_data_dir(tmp.path()).storage;
    let catalog = Arc::new(MaterialCatalogStore::new(storage.materials_path()).unwrap());
    let outliner =
        ElementOutlinerStore::new(storage.elements_path(), catalog.clone()).unwrap();

    let catalog_reloads = Arc::new(AtomicUsize::new(0));
    let c = catalog_reloads.clone();
    catalog.subscribe(move |change| {
        if change.is_reload {
            c.fetch_add(1, Ordering::SeqCst);
        }
    });
    let element_events = Arc::new(Mutex::new(Vec::new()));
    let e = element_events.clone();
    outliner.subscribe(move |change| e.lock().unwrap().push(change.clone()));

    catalog.load().await;
    outliner.load().await;

    assert_eq!(catalog_reloads.load(Ordering::SeqCst), 1);
    assert_eq!(*element_events.lock().unwrap(), vec![ElementChange::Reloaded]);
}

// ─── Catalog ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_material_rename_keeps_identity() {
    let tmp = TempDir::new().unwrap();
    let services = coordinator(&tmp).ensure_ready().await.unwrap();
    let catalog = services.catalog;
    let count = catalog.len();

    let mut mdf = catalog
        .all()
        .into_iter()
        .find(|m| m.name == "MDF 12mm")
        .unwrap();
    let id = mdf.id.clone();
    mdf.name = "MDF 12mm White".to_string();
    catalog.add_or_update(mdf).await.unwrap();

    assert_eq!(catalog.len(), count);
    assert_eq!(catalog.get_by_id(&id).unwrap().name, "MDF 12mm White");

    let reloaded = MaterialCatalogStore::new(catalog.path()).unwrap();
    reloaded.load().await;
    assert_eq!(reloaded.get_by_id(&id).unwrap().name, "MDF 12mm White");
    assert_eq!(reloaded.len(), count);
}

#[tokio::test]
async fn test_catalog_round_trip_regenerates_missing_ids() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("materials.json");
    std::fs::write(
        &path,
        r##"[{"name":"Birch 12mm","type":"Sheet","thickness":12,"width":1250,"length":2500,
             "weight":8.2,"density":680,"color":"#F5DEB3","notes":"","price_per_square_meter":21.5}]"##,
    )
    .unwrap();

    let catalog = MaterialCatalogStore::new(&path).unwrap();
    assert_eq!(catalog.load().await, 1);
    let birch = catalog.all().remove(0);
    assert!(!birch.id.is_empty());
    assert_eq!(birch.kind, MaterialType::Sheet);
    assert_eq!(birch.weight, Some(8.2));

    let again = MaterialCatalogStore::new(&path).unwrap();
    again.load().await;
    assert_eq!(again.all(), vec![birch]);
}

// ─── Outliner ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_element_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let services = coordinator(&tmp).ensure_ready().await.unwrap();
    let outliner = services.outliner;

    let mut panel = Element::new("Side Panel", ElementType::Part);
    panel.quantity = 2;
    assert!(outliner.add(panel.clone()).await);

    panel.status = ElementStatus::InProgress;
    assert!(outliner.update(panel.clone()).await);

    let in_progress = outliner.get_by_status(ElementStatus::InProgress);
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].id, panel.id);

    assert!(outliner.remove(&panel.id).await);
    assert!(outliner.get_by_id(&panel.id).is_none());
    assert_eq!(read_json(outliner.path()), serde_json::json!([]));
}

#[tokio::test]
async fn test_elements_survive_reload() {
    let tmp = TempDir::new().unwrap();
    let services = coordinator(&tmp).ensure_ready().await.unwrap();
    let plywood = services.catalog.all().remove(0);

    let mut side = Element::new("Side", ElementType::Part);
    side.tags = vec!["carcass".into(), "left".into()];
    side.priority = cnc_suite::models::ElementPriority::High;
    side.material_id = Some(plywood.id.clone());
    services.outliner.add(side.clone()).await;

    let fresh = coordinator(&tmp).ensure_ready().await.unwrap();
    let loaded = fresh.outliner.get_by_id(&side.id).unwrap();
    assert_eq!(loaded, side);
    assert_eq!(fresh.outliner.get_by_material(&plywood.id).len(), 1);
}

#[tokio::test]
async fn test_filter_is_an_intersection() {
    let tmp = TempDir::new().unwrap();
    let services = coordinator(&tmp).ensure_ready().await.unwrap();
    let outliner = services.outliner;

    let mut a = Element::new("Door Left", ElementType::Part);
    a.status = ElementStatus::Completed;
    let mut b = Element::new("Door Right", ElementType::Part);
    b.status = ElementStatus::Design;
    let mut c = Element::new("Door Hinge", ElementType::Hardware);
    c.status = ElementStatus::Completed;
    outliner.add_many(vec![a.clone(), b, c]).await;

    let by_type = ElementFilter::new().with_type(ElementType::Part);
    let by_status = ElementFilter::new().with_status(ElementStatus::Completed);
    let both = ElementFilter::new()
        .with_type(ElementType::Part)
        .with_status(ElementStatus::Completed)
        .with_text("door");

    let all = PageRequest::all();
    let type_ids: Vec<String> = outliner.filtered(&by_type, all).items.into_iter().map(|e| e.id).collect();
    let status_ids: Vec<String> = outliner.filtered(&by_status, all).items.into_iter().map(|e| e.id).collect();
    let both_ids: Vec<String> = outliner.filtered(&both, all).items.into_iter().map(|e| e.id).collect();

    let expected: Vec<String> = type_ids
        .iter()
        .filter(|id| status_ids.contains(id))
        .cloned()
        .collect();
    assert_eq!(both_ids, expected);
    assert_eq!(both_ids, vec![a.id]);
    assert_eq!(outliner.filtered(&ElementFilter::default(), all).total, 3);
    assert_eq!(outliner.len(), 3);
}

#[tokio::test]
async fn test_dangling_material_shows_unknown() {
    let tmp = TempDir::new().unwrap();
    let services = coordinator(&tmp).ensure_ready().await.unwrap();
    let mut e = Element::new("Worktop", ElementType::Part);
    e.material_id = Some("retired-material".into());
    services.outliner.add(e).await;

    let rows = element_rows(&services.outliner, &ElementFilter::default());
    assert_eq!(rows[0].material_name, UNKNOWN_MATERIAL);
}

// ─── Host document ──────────────────────────────────────────────────

#[tokio::test]
async fn test_block_sync_from_document() {
    let tmp = TempDir::new().unwrap();
    let services = coordinator(&tmp).ensure_ready().await.unwrap();
    let mut doc = InMemoryDocument::new();
    let side = doc.add_block_definition("Cabinet Side");
    doc.add_block_definition("Shelf");

    services
        .outliner
        .create_from_external_block(&side.name, &side.id)
        .await
        .unwrap();
    let added = services
        .outliner
        .sync_from_blocks(&doc.block_definitions())
        .await;

    assert_eq!(added, 1);
    assert_eq!(services.outliner.get_by_type(ElementType::Block).len(), 2);
    assert!(services.outliner.search("shelf")[0].external_id.is_some());
}

#[tokio::test]
async fn test_palette_round_trip_against_document() {
    let tmp = TempDir::new().unwrap();
    let config = SuiteConfig::with_data_dir(tmp.path());
    let services = InitializationCoordinator::from_storage(config.storage.clone())
        .ensure_ready()
        .await
        .unwrap();
    let palette = MaterialPalette::new(services.catalog.clone(), config.palette.clone());
    let batten = Material::length("Pine batten 45x20", 20.0).with_color("#EEDD82");
    let batten_id = services.catalog.add_or_update(batten).await.unwrap();
    let batten = services.catalog.get_by_id(&batten_id).unwrap();

    let mut doc = InMemoryDocument::new();
    palette.insert_geometry(&mut doc, &batten);
    palette.insert_geometry(&mut doc, &batten);

    assert_eq!(palette.select_objects(&mut doc, &batten).affected, 2);
    assert_eq!(palette.toggle_lock(&mut doc, &batten).affected, 2);
    assert!(doc.selected_objects().is_empty());
    assert_eq!(palette.toggle_visibility(&mut doc, &batten).affected, 2);
    assert!(doc.objects().iter().all(|id| !doc.is_visible(id)));
}
