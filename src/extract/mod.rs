// 🔎 Field Extractors - One rule per business term (or BT group)
//
// Every rule is a plain function over an immutable context:
//   source document (read-only) + registry (read-only) + config → fragments
//
// Rules never mutate anything. The assembler merges what they return, in the
// fixed order of `default_rules()`. A rule that reads the registry
// (cross-reference) may only read kinds filled by an EARLIER phase.

pub mod changes;
pub mod lots;
pub mod notice;
pub mod organizations;
pub mod results;

use crate::config::ConverterConfig;
use crate::dates;
use crate::entities::EntityRegistry;
use crate::fragment::Fragment;
use crate::source::{self, SourceDocument};
use roxmltree::Node;
use serde_json::{json, Value};

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// Execution phase. Rules run in declaration order; the phase documents
/// which earlier registry contents a rule may rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Envelope and procedure-level tender fields
    Notice,
    /// Organization records (every role rule depends on these)
    Organizations,
    /// Party roles and synthetic parties
    Roles,
    /// Lots, lot groups, parts, documents
    Lots,
    /// Awards, bids, contracts, statistics
    Results,
    /// Amendment records
    Changes,
}

pub struct ExtractContext<'a, 'input> {
    pub doc: &'a SourceDocument<'input>,
    pub registry: &'a EntityRegistry,
    pub config: &'a ConverterConfig,
}

impl<'a, 'input> ExtractContext<'a, 'input> {
    pub fn root(&self) -> Node<'a, 'input> {
        self.doc.root()
    }

    /// Nodes under the eForms extension block of the notice root
    pub fn extension_nodes(&self, path: &str) -> Vec<Node<'a, 'input>> {
        match self.doc.extension() {
            Some(extension) => source::find_nodes(extension, path),
            None => Vec::new(),
        }
    }
}

pub type ExtractFn = fn(&ExtractContext<'_, '_>) -> anyhow::Result<Vec<Fragment>>;

#[derive(Clone)]
pub struct ExtractionRule {
    /// Business term code(s), used in logs
    pub code: &'static str,
    pub name: &'static str,
    pub phase: Phase,
    pub extract: ExtractFn,
}

impl std::fmt::Debug for ExtractionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionRule")
            .field("code", &self.code)
            .field("name", &self.name)
            .field("phase", &self.phase)
            .finish()
    }
}

macro_rules! rule {
    ($code:expr, $name:expr, $phase:ident, $extract:path) => {
        ExtractionRule {
            code: $code,
            name: $name,
            phase: Phase::$phase,
            extract: $extract,
        }
    };
}

/// The fixed rule order
///
/// Dependencies:
/// - every Roles rule needs Organizations (parties must exist)
/// - `award_suppliers` reads party names registered by Organizations
/// - `lot_results` runs before `lot_tenders`; the award may create a bid first
pub fn default_rules() -> Vec<ExtractionRule> {
    vec![
        // Phase 1: notice envelope
        rule!("BT-701/BT-757", "Notice identifier", Notice, notice::release_id),
        rule!("BT-04", "Procedure identifier", Notice, notice::ocid),
        rule!("BT-05", "Notice dispatch date", Notice, notice::issue_date),
        rule!("BT-02/BT-03", "Notice type", Notice, notice::release_tag),
        rule!("BT-702", "Notice language", Notice, notice::language),
        rule!("BT-01", "Legal basis", Notice, notice::legal_basis),
        rule!("BT-21/BT-24/BT-22", "Procedure title", Notice, notice::procedure_project),
        rule!("BT-23", "Main nature", Notice, notice::main_nature),
        rule!("BT-27", "Procedure estimated value", Notice, notice::procedure_value),
        rule!("BT-262/BT-263", "Procedure classification", Notice, notice::procedure_classification),
        rule!("BT-105", "Procedure type", Notice, notice::procedure_type),
        rule!("BT-106/BT-1351", "Accelerated procedure", Notice, notice::accelerated),
        rule!("BT-135/BT-136", "Direct award justification", Notice, notice::direct_award),
        rule!("BT-31/BT-33", "Lot limits", Notice, notice::lot_details),
        rule!("BT-125", "Previous planning notice", Notice, notice::related_processes),
        // Phase 2: organizations
        rule!("OPT-200", "Organizations", Organizations, organizations::organizations),
        rule!("OPT-202/OPT-302", "Beneficial owners", Organizations, organizations::beneficial_owners),
        // Phase 3: roles
        rule!("OPT-300", "Buyer", Roles, organizations::buyers),
        rule!("BT-11/BT-10/BT-610", "Buyer classification", Roles, organizations::buyer_classifications),
        rule!("OPT-030", "Service providers", Roles, organizations::service_providers),
        rule!("OPT-301", "Lot organization roles", Roles, organizations::lot_roles),
        rule!("BT-60", "EU funds", Roles, organizations::eu_funder),
        // Phase 4: lots, groups, parts, documents
        rule!("BT-137", "Lots", Lots, lots::lots),
        rule!("BT-262/BT-5071", "Lot items", Lots, lots::items),
        rule!("BT-36/BT-536/BT-537", "Contract period", Lots, lots::contract_period),
        rule!("BT-54/BT-58", "Options and renewal", Lots, lots::options),
        rule!("BT-63/BT-765/BT-766/BT-767", "Submission terms and techniques", Lots, lots::techniques),
        rule!("BT-539/BT-540/BT-541/BT-734", "Award criteria", Lots, lots::award_criteria),
        rule!("BT-131/BT-1311/BT-132", "Lot deadlines", Lots, lots::deadlines),
        rule!("BT-97/BT-17/BT-71/BT-75", "Submission terms", Lots, lots::submission_terms),
        rule!("BT-330/BT-1375/BT-157", "Lot groups", Lots, lots::lot_groups),
        rule!("BT-137-Part", "Parts", Lots, lots::parts),
        rule!("BT-15/BT-14/BT-615", "Documents", Lots, lots::documents),
        // Phase 5: results
        rule!("BT-13713/BT-142/BT-144", "Lot results", Results, results::lot_results),
        rule!("BT-710/BT-711/BT-759/BT-760", "Bid statistics", Results, results::bid_statistics),
        rule!("BT-13714/BT-720/BT-171", "Lot tenders", Results, results::lot_tenders),
        rule!("OPT-310/OPT-210", "Tenderers", Results, results::tenderers),
        rule!("OPT-300-Supplier", "Award suppliers", Results, results::award_suppliers),
        rule!("BT-150/BT-145/BT-721", "Settled contracts", Results, results::contracts),
        rule!("BT-1451", "Winner decision date", Results, results::award_dates),
        // Phase 6: changes
        rule!("BT-13716/BT-140/BT-141", "Changes", Changes, changes::changes),
    ]
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Parse a decimal; absent (never zero) when it fails
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn parse_integer(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// eForms indicator ("true" / "false")
pub fn parse_indicator(text: &str) -> Option<bool> {
    match text.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// `{amount, currency}` from an amount element carrying `currencyID`
pub fn amount(node: Node<'_, '_>, path: &str) -> Option<Value> {
    let element = source::find_node(node, path)?;
    let number = source::text_of(element).and_then(|t| parse_number(&t))?;
    let currency = element.attribute("currencyID").map(str::trim);
    Some(json!({ "amount": number, "currency": currency }))
}

pub fn number(node: Node<'_, '_>, path: &str) -> Option<f64> {
    source::find_text(node, path).and_then(|t| parse_number(&t))
}

pub fn integer(node: Node<'_, '_>, path: &str) -> Option<i64> {
    source::find_text(node, path).and_then(|t| parse_integer(&t))
}

pub fn indicator(node: Node<'_, '_>, path: &str) -> Option<bool> {
    source::find_text(node, path).and_then(|t| parse_indicator(&t))
}

/// Total of several `{amount, currency}` values. Absent when the list is
/// empty or the currencies differ: mixed currencies are never summed.
pub fn sum_amounts(values: &[Value]) -> Option<Value> {
    let mut total = 0.0;
    let mut currency: Option<&str> = None;
    for value in values {
        let amount = value.get("amount").and_then(Value::as_f64)?;
        let this = value.get("currency").and_then(Value::as_str)?;
        match currency {
            None => currency = Some(this),
            Some(seen) if seen == this => {}
            Some(seen) => {
                tracing::debug!(first = seen, other = this, "Not summing amounts in mixed currencies");
                return None;
            }
        }
        total += amount;
    }
    currency.map(|currency| json!({ "amount": total, "currency": currency }))
}

/// Timestamp from a `*Date` / `*Time` pair. A malformed value is logged
/// and treated as absent.
pub fn timestamp(
    node: Node<'_, '_>,
    date_path: &str,
    time_path: &str,
    default_time: &str,
) -> Option<String> {
    let date = source::find_text(node, date_path)?;
    let time = source::find_text(node, time_path);
    match dates::combine(&date, time.as_deref(), default_time) {
        Ok(stamp) => Some(stamp),
        Err(e) => {
            tracing::debug!(date = %date, error = %e, "Ignoring malformed date");
            None
        }
    }
}

/// `cac:ProcurementProjectLot` nodes whose `cbc:ID` has the given scheme,
/// paired with that id
pub fn project_lots<'a, 'i>(root: Node<'a, 'i>, scheme: &str) -> Vec<(String, Node<'a, 'i>)> {
    source::find_nodes(root, "cac:ProcurementProjectLot")
        .into_iter()
        .filter_map(|lot| {
            let id_node = source::find_node(lot, "cbc:ID")?;
            if id_node.attribute("schemeName") != Some(scheme) {
                return None;
            }
            source::text_of(id_node).map(|id| (id, lot))
        })
        .collect()
}

/// `{id, scheme}` classification from an `ItemClassificationCode` element
pub fn classification(node: Node<'_, '_>) -> Option<Value> {
    let id = source::text_of(node)?;
    let scheme = node
        .attribute("listName")
        .map(str::to_uppercase)
        .unwrap_or_else(|| "CPV".to_string());
    Some(json!({ "scheme": scheme, "id": id }))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::SourceDocument;

    /// Minimal notice wrapper declaring every namespace used by the rules
    pub fn create_test_notice(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ContractAwardNotice xmlns="urn:oasis:names:specification:ubl:schema:xsd:ContractAwardNotice-2"
    xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2"
    xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
    xmlns:ext="urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2"
    xmlns:efac="http://data.europa.eu/p27/eforms-ubl-extension-aggregate-components/1"
    xmlns:efbc="http://data.europa.eu/p27/eforms-ubl-extension-basic-components/1"
    xmlns:efext="http://data.europa.eu/p27/eforms-ubl-extensions/1">
{}
</ContractAwardNotice>"#,
            body
        )
    }

    /// Wrap content in the root eForms extension block
    pub fn create_test_extension(content: &str) -> String {
        format!(
            "<ext:UBLExtensions><ext:UBLExtension><ext:ExtensionContent><efext:EformsExtension>{}</efext:EformsExtension></ext:ExtensionContent></ext:UBLExtension></ext:UBLExtensions>",
            content
        )
    }

    /// Run one rule against a fresh registry and default config
    pub fn run_rule(xml: &str, extract: ExtractFn) -> Vec<Fragment> {
        let doc = SourceDocument::parse(xml).unwrap();
        let registry = EntityRegistry::new();
        let config = ConverterConfig::default();
        let ctx = ExtractContext {
            doc: &doc,
            registry: &registry,
            config: &config,
        };
        extract(&ctx).unwrap()
    }

    #[test]
    fn test_parse_number_is_absent_not_zero() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_amount_with_currency() {
        let xml = create_test_notice(
            r#"<cbc:TotalAmount currencyID="EUR">1000.50</cbc:TotalAmount>
               <cbc:LowerTenderAmount currencyID="EUR">n/a</cbc:LowerTenderAmount>"#,
        );
        let doc = SourceDocument::parse(&xml).unwrap();
        assert_eq!(
            amount(doc.root(), "cbc:TotalAmount"),
            Some(json!({"amount": 1000.5, "currency": "EUR"}))
        );
        assert_eq!(amount(doc.root(), "cbc:LowerTenderAmount"), None);
    }

    #[test]
    fn test_sum_amounts_single_currency_only() {
        let eur = [
            json!({"amount": 100.0, "currency": "EUR"}),
            json!({"amount": 50.5, "currency": "EUR"}),
        ];
        assert_eq!(sum_amounts(&eur), Some(json!({"amount": 150.5, "currency": "EUR"})));

        let mixed = [
            json!({"amount": 100.0, "currency": "EUR"}),
            json!({"amount": 50.0, "currency": "USD"}),
        ];
        assert_eq!(sum_amounts(&mixed), None);
        assert_eq!(sum_amounts(&[]), None);
    }

    #[test]
    fn test_project_lots_by_scheme() {
        let xml = create_test_notice(
            r#"<cac:ProcurementProjectLot><cbc:ID schemeName="Lot">LOT-0001</cbc:ID></cac:ProcurementProjectLot>
               <cac:ProcurementProjectLot><cbc:ID schemeName="Part">PAR-0001</cbc:ID></cac:ProcurementProjectLot>
               <cac:ProcurementProjectLot><cbc:ID schemeName="Lot"> </cbc:ID></cac:ProcurementProjectLot>"#,
        );
        let doc = SourceDocument::parse(&xml).unwrap();
        let lots: Vec<String> = project_lots(doc.root(), "Lot").into_iter().map(|(id, _)| id).collect();
        assert_eq!(lots, vec!["LOT-0001"]);
        assert_eq!(project_lots(doc.root(), "Part").len(), 1);
    }

    #[test]
    fn test_malformed_timestamp_is_absent() {
        let xml = create_test_notice("<cbc:IssueDate>31/12/2020</cbc:IssueDate>");
        let doc = SourceDocument::parse(&xml).unwrap();
        assert_eq!(timestamp(doc.root(), "cbc:IssueDate", "cbc:IssueTime", dates::START_OF_DAY), None);
    }

    #[test]
    fn test_default_rules_phase_order() {
        let rules = default_rules();
        let phases: Vec<Phase> = rules.iter().map(|r| r.phase).collect();
        let mut sorted = phases.clone();
        sorted.sort();
        assert_eq!(phases, sorted);

        let position = |name: &str| rules.iter().position(|r| r.name == name).unwrap();
        assert!(position("Lot results") < position("Lot tenders"));
        assert!(position("Organizations") < position("Award suppliers"));
    }
}
