// End-to-end conversion of complete notices, library and CLI

use notice_release::extract::organizations::eu_funder_id;
use notice_release::{convert, convert_with_config, ConversionError, ConverterConfig};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::process::Command;

const CAN_SAMPLE: &str = include_str!("fixtures/can_sample.xml");
const PIN_PARTS: &str = include_str!("fixtures/pin_parts.xml");

fn convert_sample() -> Value {
    convert(CAN_SAMPLE.as_bytes()).expect("sample notice converts")
}

fn find_by_id<'a>(items: &'a Value, id: &str) -> &'a Value {
    items
        .as_array()
        .and_then(|items| items.iter().find(|item| item["id"] == id))
        .unwrap_or_else(|| panic!("no entry with id {}", id))
}

fn ids(items: &Value) -> Vec<String> {
    items
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["id"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn amount(value: &Value) -> f64 {
    value["amount"].as_f64().expect("numeric amount")
}

// ============================================================================
// RELEASE ENVELOPE
// ============================================================================

#[test]
fn test_release_envelope() {
    let release = convert_sample();

    assert_eq!(release["id"], "f0a1b2c3-0000-4000-8000-000000000001-01");
    assert_eq!(release["ocid"], "ocds-prefix-1e86a664-ae3c-41eb-8529-0242ac130003");
    assert_eq!(release["date"], "2023-03-01T10:00:00+01:00");
    assert_eq!(release["tag"], json!(["award", "contract"]));
    assert_eq!(release["language"], "en");
    assert_eq!(release["initiationType"], "tender");
}

#[test]
fn test_configured_ocid_prefix() {
    let config = ConverterConfig::from_toml_str(r#"ocid_prefix = "ocds-abc123""#).unwrap();
    let release = convert_with_config(CAN_SAMPLE.as_bytes(), &config).unwrap();
    assert_eq!(release["ocid"], "ocds-abc123-1e86a664-ae3c-41eb-8529-0242ac130003");
}

#[test]
fn test_tender_fields() {
    let release = convert_sample();
    let tender = &release["tender"];

    assert_eq!(tender["id"], "1e86a664-ae3c-41eb-8529-0242ac130003");
    assert_eq!(tender["title"], "Winter road maintenance");
    assert_eq!(tender["mainProcurementCategory"], "services");
    assert_eq!(tender["classification"]["id"], "90620000");
    assert_eq!(tender["legalBasis"]["id"], "32014L0024");
    assert_eq!(tender["legalBasis"]["scheme"], "CELEX");
    assert_eq!(tender["awardCriteria"], "ratedCriteria");
    assert_eq!(ids(&tender["lots"]), vec!["LOT-0001", "LOT-0002"]);
    assert_eq!(ids(&tender["documents"]), vec!["DOC-0001"]);
}

#[test]
fn test_lot_fields() {
    let release = convert_sample();
    let lot = find_by_id(&release["tender"]["lots"], "LOT-0001");

    assert_eq!(lot["title"], "City centre");
    assert_eq!(amount(&lot["value"]), 2000.0);
    assert_eq!(lot["value"]["currency"], "EUR");
    assert_eq!(lot["contractPeriod"]["durationInDays"], 180);
    assert_eq!(lot["awardCriteria"]["criteria"].as_array().map(Vec::len), Some(2));
}

// ============================================================================
// PARTIES
// ============================================================================

#[test]
fn test_split_organization_records_merge() {
    let release = convert_sample();
    let parties = release["parties"].as_array().unwrap();

    let buyers: Vec<&Value> = parties.iter().filter(|p| p["id"] == "ORG-0001").collect();
    assert_eq!(buyers.len(), 1);

    let buyer = buyers[0];
    assert_eq!(buyer["name"], "City of Graz");
    assert_eq!(buyer["address"]["locality"], "Graz");
    assert_eq!(buyer["address"]["postalCode"], "8010");
    assert_eq!(buyer["contactPoint"]["email"], "procurement@graz.example");
    assert_eq!(buyer["identifier"], json!({"id": "AT-123456", "legalName": "City of Graz"}));
    assert!(buyer["roles"].as_array().unwrap().contains(&json!("buyer")));
}

#[test]
fn test_party_roles() {
    let release = convert_sample();
    let parties = &release["parties"];

    let court = find_by_id(parties, "ORG-0003");
    assert_eq!(court["roles"], json!(["reviewBody"]));

    let winner = find_by_id(parties, "ORG-0004");
    let roles = winner["roles"].as_array().unwrap();
    assert!(roles.contains(&json!("tenderer")));
    assert!(roles.contains(&json!("supplier")));
    assert_eq!(winner["details"]["scale"], "small");
    assert_eq!(winner["beneficialOwners"][0]["name"], "Maria Huber");
}

#[test]
fn test_eu_funder_party() {
    let release = convert_sample();
    let funder = find_by_id(&release["parties"], &eu_funder_id());
    assert_eq!(funder["name"], "European Union");
    assert_eq!(funder["roles"], json!(["funder"]));
}

#[test]
fn test_parties_sorted() {
    let release = convert_sample();
    let party_ids = ids(&release["parties"]);
    let mut sorted = party_ids.clone();
    sorted.sort();
    assert_eq!(party_ids, sorted);
}

// ============================================================================
// RESULTS
// ============================================================================

#[test]
fn test_bid_created_from_result_reference() {
    let release = convert_sample();
    let bid = find_by_id(&release["bids"]["details"], "TEN-0001");

    assert_eq!(bid["relatedLots"], json!(["LOT-0001"]));
    assert_eq!(amount(&bid["value"]), 1500.0);
    assert_eq!(bid["rank"], 1);
    assert_eq!(bid["tenderers"], json!([{"id": "ORG-0004", "name": "Winter Services GmbH"}]));
}

#[test]
fn test_awards() {
    let release = convert_sample();
    let awards = &release["awards"];

    let won = find_by_id(awards, "RES-0001");
    assert_eq!(won["status"], "active");
    assert_eq!(won["date"], "2023-02-01T00:00:00+01:00");
    assert_eq!(won["suppliers"], json!([{"id": "ORG-0004", "name": "Winter Services GmbH"}]));
    assert_eq!(amount(&won["value"]), 1500.0);
    assert_eq!(won["relatedBids"], json!(["TEN-0001"]));

    let lost = find_by_id(awards, "RES-0002");
    assert_eq!(lost["status"], "unsuccessful");
    assert!(lost["statusDetails"].as_str().unwrap().starts_with("No tenders"));
    assert!(lost.get("suppliers").is_none());
}

#[test]
fn test_bid_statistics() {
    let release = convert_sample();
    let statistic = find_by_id(&release["bids"]["statistics"], "RES-0001-bids");
    assert_eq!(statistic["measure"], "bids");
    assert_eq!(statistic["value"].as_f64(), Some(3.0));
    assert_eq!(statistic["relatedLot"], "LOT-0001");
}

#[test]
fn test_contract() {
    let release = convert_sample();
    let contract = find_by_id(&release["contracts"], "CON-0001");

    assert_eq!(contract["awardID"], "RES-0001");
    assert_eq!(contract["title"], "Snow clearing contract");
    assert_eq!(contract["dateSigned"], "2023-02-15T00:00:00+01:00");
    assert_eq!(amount(&contract["value"]), 1500.0);
    assert_eq!(contract["relatedBids"], json!(["TEN-0001"]));
    assert_eq!(contract["identifiers"][0]["id"], "2023/0042");
}

// ============================================================================
// GLOBAL PROPERTIES
// ============================================================================

#[test]
fn test_conversion_is_deterministic() {
    let first = serde_json::to_string(&convert_sample()).unwrap();
    let second = serde_json::to_string(&convert_sample()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_entity_ids_unique() {
    let release = convert_sample();
    for collection in [
        &release["parties"],
        &release["awards"],
        &release["contracts"],
        &release["bids"]["details"],
        &release["tender"]["lots"],
        &release["tender"]["documents"],
    ] {
        let all = ids(collection);
        let unique: HashSet<&String> = all.iter().collect();
        assert_eq!(all.len(), unique.len(), "duplicate ids in {:?}", all);
    }
}

#[test]
fn test_no_empty_values() {
    fn assert_no_empty(value: &Value, path: &str) {
        match value {
            Value::Null => panic!("null at {}", path),
            Value::String(s) => assert!(!s.is_empty(), "empty string at {}", path),
            Value::Array(items) => {
                assert!(!items.is_empty(), "empty list at {}", path);
                for (i, item) in items.iter().enumerate() {
                    assert_no_empty(item, &format!("{}[{}]", path, i));
                }
            }
            Value::Object(map) => {
                assert!(!map.is_empty(), "empty object at {}", path);
                for (key, item) in map {
                    assert_no_empty(item, &format!("{}.{}", path, key));
                }
            }
            _ => {}
        }
    }
    assert_no_empty(&convert_sample(), "release");
}

// ============================================================================
// PARTS
// ============================================================================

#[test]
fn test_part_values_summed() {
    let release = convert(PIN_PARTS.as_bytes()).unwrap();
    assert_eq!(release["tag"], json!(["planning"]));
    assert_eq!(release["language"], "de");
    assert_eq!(amount(&release["tender"]["value"]), 1500.0);
    assert_eq!(release["tender"]["value"]["currency"], "EUR");
}

#[test]
fn test_part_values_mixed_currencies_not_summed() {
    let xml = PIN_PARTS.replace(r#"currencyID="EUR">500"#, r#"currencyID="USD">500"#);
    let release = convert(xml.as_bytes()).unwrap();
    assert!(release["tender"].get("value").is_none());
}

// ============================================================================
// FATAL INPUT
// ============================================================================

#[test]
fn test_truncated_document_is_fatal() {
    let truncated = &CAN_SAMPLE[..CAN_SAMPLE.len() / 2];
    let result = convert(truncated.as_bytes());
    assert!(matches!(result, Err(ConversionError::Parse(_))));
}

#[test]
fn test_invalid_utf8_is_fatal() {
    let mut bytes = CAN_SAMPLE.as_bytes().to_vec();
    bytes.insert(200, 0xFF);
    let result = convert(&bytes);
    assert!(matches!(result, Err(ConversionError::Encoding(_))));
}

// ============================================================================
// CLI
// ============================================================================

fn run_cli(args: &[&Path]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_notice-release"))
        .args(args)
        .env_remove("NOTICE_RELEASE_CONFIG")
        .env_remove("NOTICE_RELEASE_OCID_PREFIX")
        .env_remove("NOTICE_RELEASE_PRETTY")
        .output()
        .expect("binary runs")
}

#[test]
fn test_cli_writes_release_per_input() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("award.xml"), CAN_SAMPLE).unwrap();
    fs::write(input.path().join("plan.xml"), PIN_PARTS).unwrap();

    let result = run_cli(&[input.path(), Path::new("--output-dir"), output.path()]);
    assert!(result.status.success());

    let written = fs::read_to_string(output.path().join("award.json")).unwrap();
    let release: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(release, convert_sample());
    assert!(output.path().join("plan.json").exists());
}

#[test]
fn test_cli_failure_writes_nothing() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let good = input.path().join("good.xml");
    let broken = input.path().join("broken.xml");
    fs::write(&good, CAN_SAMPLE).unwrap();
    fs::write(&broken, &CAN_SAMPLE[..CAN_SAMPLE.len() / 2]).unwrap();

    let result = run_cli(&[good.as_path(), broken.as_path(), Path::new("-o"), output.path()]);
    assert!(!result.status.success());
    assert!(output.path().join("good.json").exists());
    assert!(!output.path().join("broken.json").exists());
}

#[test]
fn test_cli_stdout_without_output_dir() {
    let input = tempfile::tempdir().unwrap();
    let notice = input.path().join("plan.xml");
    fs::write(&notice, PIN_PARTS).unwrap();

    let result = run_cli(&[notice.as_path()]);
    assert!(result.status.success());
    let release: Value = serde_json::from_slice(&result.stdout).unwrap();
    assert_eq!(release["tender"]["title"], "School catering 2024");
}
