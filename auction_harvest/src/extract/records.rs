use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::clean_text;
use crate::model::VehicleRecord;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("constant selector is valid")
}

static ITEM_ROW: LazyLock<Selector> = LazyLock::new(|| selector(r#"tr[id^="auction_item_"]"#));
static DETAIL_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector(r##"a[href*="#/auction/vehicleDetail/"]"##));
static HEADING_LINK: LazyLock<Selector> = LazyLock::new(|| selector("h2 a"));
static TITLE_DIV: LazyLock<Selector> = LazyLock::new(|| selector(r#"div[class*="title"]"#));
static DOWNLOAD_ROW: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"tr[ng-repeat*="det in auctionDetailDownload"]"#));
static BOUND_CELL: LazyLock<Selector> = LazyLock::new(|| selector("td.ng-binding"));

static ITEM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^auction_item_(\d+)").expect("constant regex pattern is valid"));
static LINK_IDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#/auction/vehicleDetail/([^/?#]+)/(\d+)")
        .expect("constant regex pattern is valid")
});
static VID_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"VID:\s*([A-Z0-9]+)").expect("constant regex pattern is valid"));
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})").expect("constant regex pattern is valid"));
static RC_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^RC:\s*").expect("constant regex pattern is valid"));

struct FieldSelectors {
    registration: Selector,
    year: Selector,
    location: Selector,
    paper: Selector,
    rc: Selector,
    transmission: Selector,
    ownership: Selector,
    fuel: Selector,
}

static FIELDS: LazyLock<FieldSelectors> = LazyLock::new(|| {
    let li = |title: &str| selector(&format!(r#"li[title="{}"]"#, title));
    FieldSelectors {
        registration: li("Registration Number"),
        year: li("Mfg Year"),
        location: li("Location"),
        paper: li("Scrap/Without Paper"),
        rc: li("RC Available"),
        transmission: li("Transmission"),
        ownership: li("Ownership"),
        fuel: li("Fuel Type"),
    }
});

/// Yard columns of the auction's download table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YardDetails {
    pub yard_name: Option<String>,
    pub yard_location: Option<String>,
}

/// Parses an auction page into vehicle records.
///
/// Listing rows are the primary source; bare detail links are used only
/// when no row yields a record. Records are enriched with yard details from
/// the download table and deduplicated on `(vid, item_id)`, first wins.
pub fn extract_records(markup: &str) -> Vec<VehicleRecord> {
    let doc = Html::parse_document(markup);

    let mut records: Vec<VehicleRecord> =
        doc.select(&ITEM_ROW).filter_map(record_from_row).collect();
    if records.is_empty() {
        records = doc.select(&DETAIL_LINK).filter_map(record_from_link).collect();
    }

    let yards = yard_details(&doc);
    if !yards.is_empty() {
        for record in &mut records {
            let Some(reg) = record.registration_number.as_deref() else {
                continue;
            };
            if let Some(yard) = yards.get(&reg_key(reg)) {
                record.yard_name = yard.yard_name.clone();
                record.yard_location = yard.yard_location.clone();
            }
        }
    }

    dedupe(records)
}

/// Registration number -> yard details, from rows with all 13 bound cells.
pub fn yard_details(doc: &Html) -> HashMap<String, YardDetails> {
    let mut map = HashMap::new();
    for row in doc.select(&DOWNLOAD_ROW) {
        let cells: Vec<ElementRef<'_>> = row.select(&BOUND_CELL).collect();
        if cells.len() < 13 {
            continue;
        }
        let Some(reg) = clean_text(cells[1]) else {
            continue;
        };
        map.insert(
            reg_key(&reg),
            YardDetails {
                yard_name: clean_text(cells[11]),
                yard_location: clean_text(cells[12]),
            },
        );
    }
    map
}

fn reg_key(reg: &str) -> String {
    reg.trim().to_uppercase()
}

fn record_from_row(row: ElementRef<'_>) -> Option<VehicleRecord> {
    let item_id = ITEM_ID
        .captures(row.value().id()?)?
        .get(1)?
        .as_str()
        .to_string();

    let link = row.select(&DETAIL_LINK).next();
    let href = link.and_then(|a| a.value().attr("href"));
    let vid = href
        .and_then(|h| LINK_IDS.captures(h))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| vid_from_title(row))?;

    let mut record = VehicleRecord::new(vid, item_id);
    record.vehicle_link = href.map(|h| h.to_string());
    record.make_model = row
        .select(&HEADING_LINK)
        .next()
        .and_then(clean_text)
        .or_else(|| link.and_then(clean_text))
        .or_else(|| {
            link.and_then(|a| a.value().attr("title"))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        });

    let field = |sel: &Selector| row.select(sel).next().and_then(clean_text);
    record.registration_number = field(&FIELDS.registration);
    record.manufacturing_year = field(&FIELDS.year)
        .and_then(|y| YEAR.captures(&y).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()));
    record.location = field(&FIELDS.location);
    record.paper_status = field(&FIELDS.paper);
    record.rc_status = field(&FIELDS.rc)
        .map(|rc| RC_PREFIX.replace(&rc, "").trim().to_string())
        .filter(|rc| !rc.is_empty());
    record.transmission = field(&FIELDS.transmission);
    record.ownership = field(&FIELDS.ownership);
    record.fuel_type = field(&FIELDS.fuel);
    Some(record)
}

fn vid_from_title(row: ElementRef<'_>) -> Option<String> {
    row.select(&TITLE_DIV).find_map(|div| {
        let text: String = div.text().collect();
        VID_TEXT
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn record_from_link(link: ElementRef<'_>) -> Option<VehicleRecord> {
    let href = link.value().attr("href")?;
    let caps = LINK_IDS.captures(href)?;
    let vid = caps.get(1)?.as_str();
    let item_id = caps.get(2)?.as_str();
    let mut record = VehicleRecord::new(vid, item_id);
    record.vehicle_link = Some(href.to_string());
    record.make_model = clean_text(link);
    Some(record)
}

fn dedupe(records: Vec<VehicleRecord>) -> Vec<VehicleRecord> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let key = (record.vid.clone(), record.item_id.clone());
        if seen.insert(key) {
            out.push(record);
        } else {
            tracing::debug!(
                "dropping duplicate vehicle {} / {}",
                record.vid,
                record.item_id
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(item_id: &str, vid: &str, reg: &str, rc: &str) -> String {
        format!(
            r##"<tr id="auction_item_{item_id}">
              <td>
                <h2><a href="#/auction/vehicleDetail/{vid}/{item_id}" title="Maruti Swift VXI">Maruti Swift VXI</a></h2>
                <ul>
                  <li title="Registration Number" class="ng-binding">{reg}</li>
                  <li title="Mfg Year" class="ng-binding"><span class="bullet"></span> 2019</li>
                  <li title="Location" class="ng-binding"><span class="bullet"></span>• Vadodara</li>
                  <li title="Scrap/Without Paper"><span class="bullet"></span>Without Paper</li>
                  <li title="RC Available" class="ng-binding">{rc}</li>
                  <li title="Transmission"><span class="bullet"></span>Manual</li>
                  <li title="Ownership"><span class="bullet"></span>1st Owner</li>
                  <li title="Fuel Type"><span class="bullet"></span>Petrol</li>
                </ul>
              </td>
            </tr>"##
        )
    }

    fn page(rows: &[String], extra: &str) -> String {
        format!("<html><body><table>{}</table>{}</body></html>", rows.join(""), extra)
    }

    fn download_row(reg: &str, yard: &str, addr: &str) -> String {
        let mut cells = vec![r#"<td class="ng-binding">VID</td>"#.to_string()];
        cells.push(format!(r#"<td class="ng-binding">{}</td>"#, reg));
        for _ in 2..11 {
            cells.push(r#"<td class="ng-binding"></td>"#.to_string());
        }
        cells.push(format!(r#"<td class="ng-binding">{}</td>"#, yard));
        cells.push(format!(r#"<td class="ng-binding">{}</td>"#, addr));
        format!(
            r#"<table><tr ng-repeat="det in auctionDetailDownload">{}</tr></table>"#,
            cells.join("")
        )
    }

    #[test]
    fn extracts_listing_fields() {
        let html = page(&[row("6629539", "PRERKE4Z", "GJ34H5655", "RC: With Papers")], "");
        let records = extract_records(&html);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.vid, "PRERKE4Z");
        assert_eq!(r.item_id, "6629539");
        assert_eq!(r.make_model.as_deref(), Some("Maruti Swift VXI"));
        assert_eq!(r.registration_number.as_deref(), Some("GJ34H5655"));
        assert_eq!(r.manufacturing_year.as_deref(), Some("2019"));
        assert_eq!(r.location.as_deref(), Some("Vadodara"));
        assert_eq!(r.paper_status.as_deref(), Some("Without Paper"));
        assert_eq!(r.rc_status.as_deref(), Some("With Papers"));
        assert_eq!(r.transmission.as_deref(), Some("Manual"));
        assert_eq!(r.ownership.as_deref(), Some("1st Owner"));
        assert_eq!(r.fuel_type.as_deref(), Some("Petrol"));
        assert_eq!(
            r.vehicle_link.as_deref(),
            Some("#/auction/vehicleDetail/PRERKE4Z/6629539")
        );
        assert!(r.yard_name.is_none());
    }

    #[test]
    fn rc_prefix_is_case_insensitive() {
        let html = page(&[row("1", "V1", "GJ01", "rc:   Without Papers")], "");
        assert_eq!(
            extract_records(&html)[0].rc_status.as_deref(),
            Some("Without Papers")
        );
    }

    #[test]
    fn vid_falls_back_to_title_text() {
        let html = page(
            &[r#"<tr id="auction_item_77"><td><div class="vdp_title">Tata Ace VID: TX9Q2</div>
                <li title="Registration Number">GJ05ZZ0001</li></td></tr>"#
                .to_string()],
            "",
        );
        let records = extract_records(&html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vid, "TX9Q2");
        assert_eq!(records[0].item_id, "77");
        assert!(records[0].vehicle_link.is_none());
    }

    #[test]
    fn row_link_needs_item_id_to_supply_vid() {
        let with_title = r##"<tr id="auction_item_81"><td>
            <h2><a href="#/auction/vehicleDetail/LINKVID">Tata Nexon</a></h2>
            <div class="vdp_title">Tata Nexon VID: TITLEVID</div></td></tr>"##;
        let bare = r##"<tr id="auction_item_82"><td>
            <h2><a href="#/auction/vehicleDetail/LINKVID2">Tata Punch</a></h2></td></tr>"##;
        let records = extract_records(&page(&[with_title.to_string(), bare.to_string()], ""));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vid, "TITLEVID");
        assert_eq!(records[0].item_id, "81");
    }

    #[test]
    fn row_without_any_vid_is_skipped() {
        let html = page(&[r#"<tr id="auction_item_5"><td>nothing</td></tr>"#.to_string()], "");
        assert!(extract_records(&html).is_empty());
    }

    #[test]
    fn link_fallback_when_no_rows() {
        let html = r##"<div>
            <a href="#/auction/vehicleDetail/AB12/100">Honda City</a>
            <a href="#/auction/vehicleDetail/AB13/101">Honda Jazz</a>
            <a href="#/auction/vehicleDetail/AB13">no item id</a>
        </div>"##;
        let records = extract_records(html);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].vid, "AB12");
        assert_eq!(records[0].item_id, "100");
        assert_eq!(records[1].make_model.as_deref(), Some("Honda Jazz"));
        assert!(records[0].registration_number.is_none());
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let first = row("9", "DUP", "GJ01AA0001", "RC: With Papers");
        let second = row("9", "DUP", "GJ99ZZ9999", "RC: Scrap");
        let records = extract_records(&page(&[first, second], ""));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].registration_number.as_deref(), Some("GJ01AA0001"));
    }

    #[test]
    fn download_table_enriches_matching_registration() {
        let html = page(
            &[
                row("1", "V1", "GJ01AB1234", "RC: With Papers"),
                row("2", "V2", "GJ01AB9999", "RC: With Papers"),
            ],
            &format!(
                "{}{}",
                download_row("gj01ab1234", "Shree Yard", "Naroda, Ahmedabad"),
                download_row("MH12XX0000", "Other Yard", "Pune")
            ),
        );
        let records = extract_records(&html);
        assert_eq!(records[0].yard_name.as_deref(), Some("Shree Yard"));
        assert_eq!(records[0].yard_location.as_deref(), Some("Naroda, Ahmedabad"));
        assert!(records[1].yard_name.is_none());
    }

    #[test]
    fn short_download_rows_are_ignored() {
        let html = r#"<table><tr ng-repeat="det in auctionDetailDownload">
            <td class="ng-binding">V</td><td class="ng-binding">GJ01</td></tr></table>"#;
        let doc = Html::parse_document(html);
        assert!(yard_details(&doc).is_empty());
    }

    #[test]
    fn empty_markup_yields_nothing() {
        assert!(extract_records("").is_empty());
    }
}
