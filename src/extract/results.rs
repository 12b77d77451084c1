// 🏆 Result Extractors - Awards, bids, contracts and bid statistics
//
// The notice result block holds four node-sets that reference each other by id:
//
//   LotResult (RES-) ──► LotTender (TEN-) ──► TenderingParty (TPA-) ──► Organization (ORG-)
//        └────────────► SettledContract (CON-) ◄── LotTender
//
// Cross-reference rules join them here; organizations are read back from the
// registry (phase 2) for supplier and tenderer names.

use super::{amount, indicator, integer, number, sum_amounts, timestamp, ExtractContext};
use crate::codes;
use crate::dates;
use crate::entities::EntityKind;
use crate::fragment::Fragment;
use crate::source::{find_nodes, find_text, find_texts};
use anyhow::Result;
use roxmltree::Node;
use serde_json::{json, Value};
use std::collections::HashMap;

const WINNER_SELECTED: &str = "selec-w";

// ============================================================================
// RESULT INDEX
// ============================================================================

/// Id-keyed view of the notice result block
struct ResultIndex<'a, 'i> {
    results: Vec<(String, Node<'a, 'i>)>,
    tenders: HashMap<String, Node<'a, 'i>>,
    tender_order: Vec<String>,
    contracts: Vec<(String, Node<'a, 'i>)>,
    parties: HashMap<String, Node<'a, 'i>>,
}

impl<'a, 'i> ResultIndex<'a, 'i> {
    fn build(ctx: &ExtractContext<'a, 'i>) -> Self {
        let keyed = |name: &str| -> Vec<(String, Node<'a, 'i>)> {
            ctx.extension_nodes(&format!("efac:NoticeResult/{}", name))
                .into_iter()
                .filter_map(|node| find_text(node, "cbc:ID").map(|id| (id, node)))
                .collect()
        };

        let tenders = keyed("efac:LotTender");
        ResultIndex {
            results: keyed("efac:LotResult"),
            tender_order: tenders.iter().map(|(id, _)| id.clone()).collect(),
            tenders: tenders.into_iter().collect(),
            contracts: keyed("efac:SettledContract"),
            parties: keyed("efac:TenderingParty").into_iter().collect(),
        }
    }

    fn tender(&self, id: &str) -> Option<Node<'a, 'i>> {
        let tender = self.tenders.get(id).copied();
        if tender.is_none() {
            tracing::debug!(tender = id, "Reference to unknown lot tender");
        }
        tender
    }

    /// Organization ids (tenderers, subcontractors) behind a lot tender
    fn organizations(&self, tender: Node<'_, '_>, path: &str) -> Vec<String> {
        let Some(party_id) = find_text(tender, "efac:TenderingParty/cbc:ID") else {
            return Vec::new();
        };
        match self.parties.get(&party_id) {
            Some(party) => find_texts(*party, path),
            None => {
                tracing::debug!(tendering_party = %party_id, "Reference to unknown tendering party");
                Vec::new()
            }
        }
    }

    fn tender_values(&self, tender_ids: &[String]) -> Vec<Value> {
        tender_ids
            .iter()
            .filter_map(|id| self.tender(id))
            .filter_map(|tender| amount(tender, "cac:LegalMonetaryTotal/cbc:PayableAmount"))
            .collect()
    }

    /// Results listing `contract_id` among their settled contracts
    fn results_for_contract(&self, contract_id: &str) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, result)| {
                find_texts(*result, "efac:SettledContract/cbc:ID")
                    .iter()
                    .any(|id| id == contract_id)
            })
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// `{id, name}` reference to a registered party
fn party_reference(ctx: &ExtractContext, id: &str) -> Value {
    let name = ctx.registry.get(EntityKind::Party, id).and_then(|party| party.name());
    json!({ "id": id, "name": name })
}

// ============================================================================
// AWARDS & BIDS
// ============================================================================

/// BT-13713 lot result, BT-142 status, BT-144 non-award reason
///
/// Bids referenced here are created immediately; their own tender records
/// (later rule) merge into them.
pub fn lot_results(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let index = ResultIndex::build(ctx);
    let mut fragments = Vec::new();

    for (id, result) in &index.results {
        let lots = find_texts(*result, "efac:TenderLot/cbc:ID");
        let bids = find_texts(*result, "efac:LotTender/cbc:ID");
        let status = find_text(*result, "cbc:TenderResultCode").and_then(|code| codes::award_status(&code));
        let reason = find_text(*result, "efac:DecisionReason/efbc:DecisionReasonCode")
            .and_then(|code| codes::non_award_reason(&code));

        for bid in &bids {
            fragments.push(Fragment::entity(EntityKind::Bid, bid.as_str()).union("relatedLots", lots.clone()));
        }
        fragments.push(
            Fragment::entity(EntityKind::Award, id.as_str())
                .set_opt("status", status)
                .set_opt("statusDetails", reason)
                .union("relatedLots", lots)
                .union("relatedBids", bids),
        );
    }

    Ok(fragments)
}

/// BT-710 / BT-711 tender value range, BT-759 / BT-760 received submissions
pub fn bid_statistics(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    if !ctx.config.emit_bid_statistics {
        return Ok(Vec::new());
    }

    let index = ResultIndex::build(ctx);
    let mut release = Fragment::release();

    for (result_id, result) in &index.results {
        let lot = find_text(*result, "efac:TenderLot/cbc:ID");

        for (path, measure) in [
            ("cbc:LowerTenderAmount", "lowestValidBid"),
            ("cbc:HigherTenderAmount", "highestValidBid"),
        ] {
            if let Some(value) = amount(*result, path) {
                release = release.append(
                    "bids.statistics",
                    json!({
                        "id": format!("{}-{}", result_id, measure),
                        "measure": measure,
                        "value": value["amount"],
                        "currency": value["currency"],
                        "relatedLot": lot,
                    }),
                );
            }
        }

        for statistics in find_nodes(*result, "efac:ReceivedSubmissionsStatistics") {
            let measure = find_text(statistics, "efbc:StatisticsCode").and_then(|c| codes::statistics_measure(&c));
            let count = number(statistics, "efbc:StatisticsNumeric");
            if let (Some(measure), Some(count)) = (measure, count) {
                release = release.append(
                    "bids.statistics",
                    json!({
                        "id": format!("{}-{}", result_id, measure),
                        "measure": measure,
                        "value": count,
                        "relatedLot": lot,
                    }),
                );
            }
        }
    }

    Ok(vec![release])
}

/// BT-13714 lot tender: BT-720 value, BT-171 rank, BT-193 variant,
/// BT-191 origin, BT-773 subcontracting, BT-3201 identifier
pub fn lot_tenders(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let index = ResultIndex::build(ctx);
    let mut fragments = Vec::new();

    for id in &index.tender_order {
        let Some(tender) = index.tender(id) else {
            continue;
        };
        let origins: Vec<&str> = find_texts(tender, "efac:Origin/efbc:AreaCode")
            .iter()
            .filter_map(|code| codes::country_code(code))
            .collect();
        let subcontracting = find_text(tender, "efac:SubcontractingTerm/efbc:TermCode[@listName='applicability']")
            .and_then(|code| match code.as_str() {
                "yes" => Some(true),
                "no" => Some(false),
                _ => None,
            });

        let mut bid = Fragment::entity(EntityKind::Bid, id.as_str())
            .set_opt("value", amount(tender, "cac:LegalMonetaryTotal/cbc:PayableAmount"))
            .set_opt("rank", integer(tender, "cbc:RankCode"))
            .set_opt("variant", indicator(tender, "efbc:TenderVariantIndicator"))
            .set_opt("hasSubcontracting", subcontracting)
            .union("countriesOfOrigin", origins)
            .union("relatedLots", find_texts(tender, "efac:TenderLot/cbc:ID"));
        if let Some(reference) = find_text(tender, "efac:TenderReference/cbc:ID") {
            bid = bid.append("identifiers", json!({ "id": reference, "scheme": "internal" }));
        }
        fragments.push(bid);
    }

    Ok(fragments)
}

/// OPT-310 tendering party → OPT-210 / OPT-300 tenderers and subcontractors
pub fn tenderers(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let index = ResultIndex::build(ctx);
    let mut fragments = Vec::new();

    for id in &index.tender_order {
        let Some(tender) = index.tender(id) else {
            continue;
        };
        let tenderer_ids = index.organizations(tender, "efac:Tenderer/cbc:ID");
        let subcontractor_ids = index.organizations(tender, "efac:SubContractor/cbc:ID");

        let references: Vec<Value> = tenderer_ids.iter().map(|org| party_reference(ctx, org)).collect();
        if !references.is_empty() {
            fragments.push(Fragment::entity(EntityKind::Bid, id.as_str()).union("tenderers", references));
        }
        for org in tenderer_ids {
            fragments.push(Fragment::party(org).union("roles", ["tenderer"]));
        }
        for org in subcontractor_ids {
            fragments.push(Fragment::party(org).union("roles", ["subcontractor"]));
        }
    }

    Ok(fragments)
}

/// Winning results: suppliers and award value through the tender join
pub fn award_suppliers(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let index = ResultIndex::build(ctx);
    let mut fragments = Vec::new();

    for (id, result) in &index.results {
        if find_text(*result, "cbc:TenderResultCode").as_deref() != Some(WINNER_SELECTED) {
            continue;
        }
        let tender_ids = find_texts(*result, "efac:LotTender/cbc:ID");

        let mut supplier_ids: Vec<String> = Vec::new();
        for tender in tender_ids.iter().filter_map(|t| index.tender(t)) {
            for org in index.organizations(tender, "efac:Tenderer/cbc:ID") {
                if !supplier_ids.contains(&org) {
                    supplier_ids.push(org);
                }
            }
        }

        let suppliers: Vec<Value> = supplier_ids.iter().map(|org| party_reference(ctx, org)).collect();
        let value = sum_amounts(&index.tender_values(&tender_ids));
        fragments.push(
            Fragment::entity(EntityKind::Award, id.as_str())
                .union("suppliers", suppliers)
                .set_opt("value", value),
        );
        for org in supplier_ids {
            fragments.push(Fragment::party(org).union("roles", ["supplier"]));
        }
    }

    Ok(fragments)
}

// ============================================================================
// CONTRACTS
// ============================================================================

/// BT-150 reference, BT-145 signature date, BT-721 title; award and value
/// through the result and tender joins
pub fn contracts(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let index = ResultIndex::build(ctx);
    let mut fragments = Vec::new();

    for (id, contract) in &index.contracts {
        let tender_ids = find_texts(*contract, "efac:LotTender/cbc:ID");
        let award_ids = index.results_for_contract(id);

        let mut fragment = Fragment::entity(EntityKind::Contract, id.as_str())
            .set_opt("title", find_text(*contract, "cbc:Title"))
            .set_opt(
                "dateSigned",
                timestamp(*contract, "cbc:IssueDate", "cbc:IssueTime", dates::START_OF_DAY),
            )
            .set_opt("value", sum_amounts(&index.tender_values(&tender_ids)))
            .union("relatedBids", tender_ids);

        fragment = match award_ids.as_slice() {
            [] => fragment,
            [single] => fragment.set("awardID", *single),
            several => fragment.union("awardIDs", several.iter().copied()),
        };
        if let Some(reference) = find_text(*contract, "efac:ContractReference/cbc:ID") {
            fragment = fragment.append("identifiers", json!({ "id": reference, "scheme": "internal" }));
        }
        fragments.push(fragment);
    }

    Ok(fragments)
}

/// BT-1451 winner decision date, copied onto every award settled by the
/// contract
pub fn award_dates(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let index = ResultIndex::build(ctx);
    let mut fragments = Vec::new();

    for (id, contract) in &index.contracts {
        let Some(date) = timestamp(*contract, "cbc:AwardDate", "cbc:AwardTime", dates::START_OF_DAY) else {
            continue;
        };
        for award in index.results_for_contract(id) {
            fragments.push(Fragment::entity(EntityKind::Award, award).set("date", date.clone()));
        }
    }

    Ok(fragments)
}

// ============================================================================
// TESTS
// ============================================================================
