use auction_feed::{load_descriptors, parse_descriptors, AuctionDescriptor};

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

#[test]
fn deserialize_auction_paths() {
    let json = load_fixture("auction_paths.json");
    let descriptors = parse_descriptors(&json).unwrap();
    assert_eq!(descriptors.len(), 2);

    let first = &descriptors[0];
    assert_eq!(first.auction_id, "176639");
    assert_eq!(first.title, "Gujarat PSU and Surveyor Vehicle 05Dec25");
    assert_eq!(first.vehicle_count, 42);
    assert_eq!(first.locator_slug(), "Gujarat-PSU-and-Surveyor-Vehicle-05Dec25");

    let second = &descriptors[1];
    assert_eq!(second.auction_id, "176702");
    assert_eq!(second.vehicle_count, 18);
    assert_eq!(second.locator_slug(), "Salvage-Auction-Non-Motor-J-05Dec25");
}

#[test]
fn deserialize_dashboard_aliases() {
    let json = load_fixture("dashboard_items.json");
    let descriptors: Vec<AuctionDescriptor> = serde_json::from_str(&json).unwrap();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].auction_id, "180001");
    assert_eq!(descriptors[0].slug, "Insurance-Salvage-Ahmedabad-10Dec25");
    assert_eq!(descriptors[0].vehicle_count, 9);
    assert_eq!(descriptors[1].auction_id, "180002");
    assert_eq!(descriptors[1].title, "Insurance Salvage Surat 10Dec25");
    assert_eq!(descriptors[1].vehicle_count, 0);
}

#[test]
fn load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feed.json");
    std::fs::write(&path, load_fixture("auction_paths.json")).unwrap();
    let descriptors = load_descriptors(&path).unwrap();
    assert_eq!(descriptors.len(), 2);
}

#[test]
fn serialize_uses_canonical_keys() {
    let d = AuctionDescriptor::new("1", "T", "t", 4);
    let value = serde_json::to_value(&d).unwrap();
    assert_eq!(value["auction_id"], "1");
    assert_eq!(value["vehicle_count"], 4);
}
