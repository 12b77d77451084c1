// 🏗️ Release Assembler - Run every rule once, merge, then clean
//
// Pipeline:
// 1. Run the extraction rules in their fixed order
// 2. Route each fragment: release envelope, tender, registry entity,
//    party-by-name or new amendment
// 3. Copy registry collections into the envelope, attach amendments
// 4. Compute aggregate fields (award criteria summary, Part value total)
// 5. Clean the graph
//
// A failing rule never stops the pipeline; its fields are simply absent.

use crate::cleaner;
use crate::config::ConverterConfig;
use crate::entities::{EntityKind, EntityRegistry};
use crate::extract::{self, ExtractContext, ExtractionRule};
use crate::fragment::{AmendmentParent, Fragment, Patch, Target};
use crate::merge;
use crate::source::SourceDocument;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

// ============================================================================
// ASSEMBLER
// ============================================================================

pub struct ReleaseAssembler {
    config: ConverterConfig,
    rules: Vec<ExtractionRule>,
}

impl ReleaseAssembler {
    pub fn new(config: ConverterConfig) -> Self {
        Self::with_rules(config, extract::default_rules())
    }

    /// Assembler with a custom rule list (order is kept as given)
    pub fn with_rules(config: ConverterConfig, rules: Vec<ExtractionRule>) -> Self {
        ReleaseAssembler { config, rules }
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Build the release for one parsed notice
    pub fn assemble(&self, doc: &SourceDocument<'_>) -> Value {
        let mut state = AssemblyState::default();

        for rule in &self.rules {
            let ctx = ExtractContext {
                doc,
                registry: &state.registry,
                config: &self.config,
            };
            match (rule.extract)(&ctx) {
                Ok(fragments) => {
                    for fragment in fragments {
                        state.apply(rule, fragment);
                    }
                }
                Err(e) => {
                    state.failed_rules += 1;
                    debug!(bt = rule.code, rule = rule.name, error = %e, "Extraction rule failed");
                }
            }
        }

        let release = state.into_release();
        cleaner::clean(release)
    }
}

// ============================================================================
// PER-CONVERSION STATE
// ============================================================================

#[derive(Default)]
struct AssemblyState {
    registry: EntityRegistry,
    release: Map<String, Value>,
    tender: Map<String, Value>,
    failed_rules: usize,
    dropped_fragments: usize,
}

impl AssemblyState {
    fn apply(&mut self, rule: &ExtractionRule, fragment: Fragment) {
        let Fragment { target, patches } = fragment;
        match target {
            Target::Release => merge::apply_all(&mut self.release, &patches),
            Target::Tender => merge::apply_all(&mut self.tender, &patches),
            Target::Entity { kind, id } => self.merge_entity(rule, kind, &id, &patches),
            Target::PartyNamed { name, fallback_id } => {
                let id = self
                    .registry
                    .find(EntityKind::Party, |party| party.name() == Some(name.as_str()))
                    .map(|party| party.id.clone())
                    .unwrap_or(fallback_id);
                self.merge_entity(rule, EntityKind::Party, &id, &patches);
            }
            Target::Amendment { parent } => {
                let mut body = Map::new();
                merge::apply_all(&mut body, &patches);
                self.registry.append_amendment(parent, body);
            }
        }
    }

    fn merge_entity(&mut self, rule: &ExtractionRule, kind: EntityKind, id: &str, patches: &[Patch]) {
        if let Err(e) = self.registry.merge(kind, id, patches) {
            self.dropped_fragments += 1;
            warn!(bt = rule.code, error = %e, "Dropping fragment");
        }
    }

    /// Envelope with every collection copied in and aggregates computed
    fn into_release(self) -> Value {
        let AssemblyState {
            registry,
            mut release,
            mut tender,
            failed_rules,
            dropped_fragments,
        } = self;

        let mut tender_amendments = Vec::new();
        let mut lot_amendments: Vec<(String, Value)> = Vec::new();
        let mut award_amendments: Vec<(String, Value)> = Vec::new();
        for amendment in registry.amendments() {
            let value = amendment.to_value();
            match &amendment.parent {
                AmendmentParent::Lot(id) if registry.get(EntityKind::Lot, id).is_some() => {
                    lot_amendments.push((id.clone(), value))
                }
                AmendmentParent::Award(id) if registry.get(EntityKind::Award, id).is_some() => {
                    award_amendments.push((id.clone(), value))
                }
                AmendmentParent::Tender => tender_amendments.push(value),
                orphan => {
                    debug!(parent = ?orphan, "Amendment parent not found, attaching to tender");
                    tender_amendments.push(value);
                }
            }
        }

        if !tender.contains_key("awardCriteria") {
            if let Some(summary) = award_criteria_summary(&registry) {
                tender.insert("awardCriteria".into(), Value::String(summary.into()));
            }
        }
        if !tender.contains_key("value") {
            if let Some(total) = part_value_total(&registry) {
                tender.insert("value".into(), total);
            }
        }
        tender.insert("amendments".into(), Value::Array(tender_amendments));

        release.insert("initiationType".into(), Value::String("tender".into()));
        release.insert("tender".into(), Value::Object(tender));

        for kind in EntityKind::ALL {
            let Some(path) = kind.release_path() else {
                continue;
            };
            let attached: &[(String, Value)] = match kind {
                EntityKind::Lot => lot_amendments.as_slice(),
                EntityKind::Award => award_amendments.as_slice(),
                _ => &[],
            };
            let items: Vec<Value> = registry
                .entities(kind)
                .iter()
                .map(|entity| {
                    let mut value = entity.to_value();
                    let own: Vec<Value> = attached
                        .iter()
                        .filter(|(parent, _)| *parent == entity.id)
                        .map(|(_, amendment)| amendment.clone())
                        .collect();
                    if let (Some(object), false) = (value.as_object_mut(), own.is_empty()) {
                        object.insert("amendments".into(), Value::Array(own));
                    }
                    value
                })
                .collect();
            merge::apply_patch(
                &mut release,
                &Patch::ScalarSet {
                    path,
                    value: Value::Array(items),
                },
            );
        }

        let release_id = release.get("id").and_then(serde_json::Value::as_str).unwrap_or("-");
        info!(
            release = release_id,
            parties = registry.len(EntityKind::Party),
            lots = registry.len(EntityKind::Lot),
            awards = registry.len(EntityKind::Award),
            bids = registry.len(EntityKind::Bid),
            contracts = registry.len(EntityKind::Contract),
            amendments = registry.amendments().len(),
            failed_rules,
            dropped_fragments,
            "Release assembled"
        );

        Value::Object(release)
    }
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// Procedure-level award criteria code from the criterion types of all lots
fn award_criteria_summary(registry: &EntityRegistry) -> Option<&'static str> {
    let types: BTreeSet<&str> = registry
        .entities(EntityKind::Lot)
        .iter()
        .filter_map(|lot| lot.get("awardCriteria.criteria").and_then(Value::as_array))
        .flatten()
        .filter_map(|criterion| criterion.get("type").and_then(Value::as_str))
        .collect();

    let mut iter = types.iter();
    match (iter.next(), iter.next()) {
        (None, _) => None,
        (Some(&"price"), None) => Some("priceOnly"),
        (Some(&"cost"), None) => Some("costOnly"),
        (Some(&"quality"), None) => Some("qualityOnly"),
        _ => Some("ratedCriteria"),
    }
}

/// Sum of positive Part values, only when they share a single currency
fn part_value_total(registry: &EntityRegistry) -> Option<Value> {
    let values: Vec<Value> = registry
        .entities(EntityKind::Part)
        .iter()
        .filter_map(|part| part.get("value"))
        .filter(|value| value.get("amount").and_then(Value::as_f64).is_some_and(|a| a > 0.0))
        .cloned()
        .collect();
    if values.is_empty() {
        return None;
    }
    extract::sum_amounts(&values)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::create_test_notice;
    use crate::extract::Phase;
    use serde_json::json;

    fn failing_rule(_: &ExtractContext) -> anyhow::Result<Vec<Fragment>> {
        anyhow::bail!("broken business term")
    }

    fn title_rule(_: &ExtractContext) -> anyhow::Result<Vec<Fragment>> {
        Ok(vec![Fragment::tender().set("title", "Kept")])
    }

    fn empty_id_rule(_: &ExtractContext) -> anyhow::Result<Vec<Fragment>> {
        Ok(vec![
            Fragment::party("").set("name", "Nameless"),
            Fragment::party("ORG-1").set("name", "Named"),
        ])
    }

    fn funder_rule(_: &ExtractContext) -> anyhow::Result<Vec<Fragment>> {
        Ok(vec![Fragment::party_named("European Union", "ORG-EU")
            .set("name", "European Union")
            .union("roles", ["funder"])])
    }

    fn create_test_rule(name: &'static str, extract: extract::ExtractFn) -> ExtractionRule {
        ExtractionRule {
            code: "TEST",
            name,
            phase: Phase::Notice,
            extract,
        }
    }

    fn create_test_release(rules: Vec<ExtractionRule>) -> Value {
        let xml = create_test_notice("<cbc:ID>n-1</cbc:ID>");
        let doc = SourceDocument::parse(&xml).unwrap();
        ReleaseAssembler::with_rules(ConverterConfig::default(), rules).assemble(&doc)
    }

    #[test]
    fn test_failing_rule_is_isolated() {
        let release = create_test_release(vec![
            create_test_rule("failing", failing_rule),
            create_test_rule("title", title_rule),
        ]);
        assert_eq!(release["tender"]["title"], "Kept");
        assert_eq!(release["initiationType"], "tender");
    }

    #[test]
    fn test_empty_id_fragment_dropped() {
        let release = create_test_release(vec![create_test_rule("parties", empty_id_rule)]);
        assert_eq!(release["parties"], json!([{"id": "ORG-1", "name": "Named"}]));
    }

    #[test]
    fn test_party_named_reuses_existing_party() {
        fn existing(_: &ExtractContext) -> anyhow::Result<Vec<Fragment>> {
            Ok(vec![Fragment::party("ORG-7").set("name", "European Union")])
        }
        let release = create_test_release(vec![
            create_test_rule("existing", existing),
            create_test_rule("funder", funder_rule),
        ]);
        assert_eq!(
            release["parties"],
            json!([{"id": "ORG-7", "name": "European Union", "roles": ["funder"]}])
        );
    }

    #[test]
    fn test_party_named_falls_back_to_generated_id() {
        let release = create_test_release(vec![create_test_rule("funder", funder_rule)]);
        assert_eq!(release["parties"][0]["id"], "ORG-EU");
    }

    #[test]
    fn test_amendments_attach_to_parents() {
        fn lots_and_changes(_: &ExtractContext) -> anyhow::Result<Vec<Fragment>> {
            Ok(vec![
                Fragment::entity(EntityKind::Lot, "LOT-1").set("title", "Lot one"),
                Fragment::amendment(AmendmentParent::Lot("LOT-1".into())).set("description", "Lot change"),
                Fragment::amendment(AmendmentParent::Tender).set("description", "Tender change"),
                Fragment::amendment(AmendmentParent::Award("RES-404".into())).set("description", "Orphan"),
            ])
        }
        let release = create_test_release(vec![create_test_rule("changes", lots_and_changes)]);
        assert_eq!(
            release["tender"]["lots"][0]["amendments"],
            json!([{"id": "1", "description": "Lot change"}])
        );
        assert_eq!(
            release["tender"]["amendments"],
            json!([{"id": "2", "description": "Tender change"}, {"id": "3", "description": "Orphan"}])
        );
    }

    #[test]
    fn test_award_criteria_summary() {
        fn criteria(_: &ExtractContext) -> anyhow::Result<Vec<Fragment>> {
            Ok(vec![
                Fragment::entity(EntityKind::Lot, "LOT-1").append("awardCriteria.criteria", json!({"type": "price"})),
                Fragment::entity(EntityKind::Lot, "LOT-2").append("awardCriteria.criteria", json!({"type": "price"})),
            ])
        }
        let release = create_test_release(vec![create_test_rule("criteria", criteria)]);
        assert_eq!(release["tender"]["awardCriteria"], "priceOnly");
    }

    #[test]
    fn test_part_values_summed_per_currency() {
        fn parts(_: &ExtractContext) -> anyhow::Result<Vec<Fragment>> {
            Ok(vec![
                Fragment::entity(EntityKind::Part, "PAR-1").set("value", json!({"amount": 100.0, "currency": "EUR"})),
                Fragment::entity(EntityKind::Part, "PAR-2").set("value", json!({"amount": 250.0, "currency": "EUR"})),
                Fragment::entity(EntityKind::Part, "PAR-3").set("value", json!({"amount": 0.0, "currency": "USD"})),
            ])
        }
        let release = create_test_release(vec![create_test_rule("parts", parts)]);
        assert_eq!(release["tender"]["value"], json!({"amount": 350.0, "currency": "EUR"}));
        assert!(release.get("parts").is_none());
    }

    #[test]
    fn test_part_values_mixed_currencies_not_summed() {
        fn parts(_: &ExtractContext) -> anyhow::Result<Vec<Fragment>> {
            Ok(vec![
                Fragment::entity(EntityKind::Part, "PAR-1").set("value", json!({"amount": 100.0, "currency": "EUR"})),
                Fragment::entity(EntityKind::Part, "PAR-2").set("value", json!({"amount": 250.0, "currency": "USD"})),
            ])
        }
        let release = create_test_release(vec![create_test_rule("parts", parts)]);
        assert!(release["tender"].get("value").is_none());
    }
}
