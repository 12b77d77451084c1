// 📦 Lot Extractors - Lots, lot groups, parts and procurement documents
//
// Collection rules: one fragment per `cac:ProcurementProjectLot`, addressed
// by the lot's own id. Several rules address the same lot; the registry
// merges them.

use super::organizations::postal_address;
use super::{amount, classification, indicator, integer, number, project_lots, timestamp, ExtractContext};
use crate::codes;
use crate::dates;
use crate::entities::EntityKind;
use crate::fragment::Fragment;
use crate::source::{find_attribute, find_node, find_nodes, find_text, find_texts, text_of};
use anyhow::Result;
use roxmltree::Node;
use serde_json::{json, Value};

const LOT: &str = "Lot";
const LOTS_GROUP: &str = "LotsGroup";
const PART: &str = "Part";

fn lot_fragment(id: &str) -> Fragment {
    Fragment::entity(EntityKind::Lot, id)
}

// ============================================================================
// LOTS
// ============================================================================

/// BT-137 lot id; BT-21 / BT-24 / BT-23 / BT-27 per lot
pub fn lots(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (id, lot) in project_lots(ctx.root(), LOT) {
        let mut fragment = lot_fragment(&id);
        if let Some(project) = find_node(lot, "cac:ProcurementProject") {
            let category = find_text(project, "cbc:ProcurementTypeCode")
                .and_then(|code| codes::procurement_category(&code));
            fragment = fragment
                .set_opt("title", find_text(project, "cbc:Name"))
                .set_opt("description", find_text(project, "cbc:Description"))
                .set_opt("mainProcurementCategory", category)
                .set_opt(
                    "value",
                    amount(project, "cac:RequestedTenderTotal/cbc:EstimatedOverallContractAmount"),
                );
        }
        fragments.push(fragment);
    }
    Ok(fragments)
}

/// BT-262 / BT-263 item classifications, BT-5071 etc. place of performance
pub fn items(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (id, lot) in project_lots(ctx.root(), LOT) {
        let Some(project) = find_node(lot, "cac:ProcurementProject") else {
            continue;
        };
        let main = find_node(project, "cac:MainCommodityClassification/cbc:ItemClassificationCode")
            .and_then(classification);
        let additional: Vec<Value> = find_nodes(
            project,
            "cac:AdditionalCommodityClassification/cbc:ItemClassificationCode",
        )
        .into_iter()
        .filter_map(classification)
        .collect();
        let addresses: Vec<Value> = find_nodes(project, "cac:RealizedLocation")
            .into_iter()
            .map(delivery_address)
            .collect();

        if main.is_none() && additional.is_empty() && addresses.is_empty() {
            continue;
        }
        fragments.push(lot_fragment(&id).append(
            "items",
            json!({
                "id": "1",
                "classification": main,
                "additionalClassifications": additional,
                "deliveryAddresses": addresses,
            }),
        ));
    }
    Ok(fragments)
}

fn delivery_address(location: Node<'_, '_>) -> Value {
    let mut address = match find_node(location, "cac:Address") {
        Some(node) => postal_address(node),
        None => json!({}),
    };
    if let (Some(object), Some(description)) =
        (address.as_object_mut(), find_text(location, "cbc:Description"))
    {
        object.insert("description".into(), Value::String(description));
    }
    address
}

/// BT-536 start, BT-537 end, BT-36 duration
pub fn contract_period(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (id, lot) in project_lots(ctx.root(), LOT) {
        let Some(period) = find_node(lot, "cac:ProcurementProject/cac:PlannedPeriod") else {
            continue;
        };
        let start = timestamp(period, "cbc:StartDate", "cbc:StartTime", dates::START_OF_DAY);
        let end = timestamp(period, "cbc:EndDate", "cbc:EndTime", dates::END_OF_DAY);
        let duration = find_node(period, "cbc:DurationMeasure").and_then(duration_in_days);

        fragments.push(
            lot_fragment(&id)
                .set_opt("contractPeriod.startDate", start)
                .set_opt("contractPeriod.endDate", end)
                .set_opt("contractPeriod.durationInDays", duration),
        );
    }
    Ok(fragments)
}

/// `cbc:DurationMeasure` in days; months count 30 days, years 365
fn duration_in_days(measure: Node<'_, '_>) -> Option<i64> {
    let count = text_of(measure).and_then(|t| super::parse_integer(&t))?;
    let factor = match measure.attribute("unitCode")? {
        "DAY" => 1,
        "WEEK" => 7,
        "MONTH" => 30,
        "YEAR" => 365,
        other => {
            tracing::debug!(unit = other, "Unknown duration unit");
            return None;
        }
    };
    let days = count.checked_mul(factor);
    if days.is_none() {
        tracing::debug!(count, factor, "Duration out of range");
    }
    days
}

/// BT-54 options, BT-58 / BT-57 renewals
pub fn options(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (id, lot) in project_lots(ctx.root(), LOT) {
        let Some(extension) = find_node(lot, "cac:ProcurementProject/cac:ContractExtension") else {
            continue;
        };
        let options = find_text(extension, "cbc:OptionsDescription");
        let renewals = integer(extension, "cbc:MaximumNumberNumeric");
        let renewal_description = find_text(extension, "cac:Renewal/cac:Period/cbc:Description");

        fragments.push(
            lot_fragment(&id)
                .set_opt("hasOptions", options.is_some().then_some(true))
                .set_opt("options.description", options)
                .set_opt("hasRenewal", renewals.filter(|n| *n > 0).map(|_| true))
                .set_opt("renewal.maximumRenewals", renewals)
                .set_opt("renewal.description", renewal_description),
        );
    }
    Ok(fragments)
}

/// BT-63 variants, BT-765 framework, BT-766 DPS, BT-767 e-auction
pub fn techniques(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (id, lot) in project_lots(ctx.root(), LOT) {
        let variants = find_text(lot, "cac:TenderingTerms/cbc:VariantConstraintCode").and_then(|code| {
            match code.as_str() {
                "allowed" => Some("allowed"),
                "required" => Some("required"),
                "not-allowed" => Some("notAllowed"),
                _ => None,
            }
        });

        let system = |list: &str| {
            find_text(
                lot,
                &format!(
                    "cac:TenderingProcess/cac:ContractingSystem/cbc:ContractingSystemTypeCode[@listName='{}']",
                    list
                ),
            )
            .map(|code| code != "none")
        };
        let auction = indicator(lot, "cac:TenderingProcess/cac:AuctionTerms/cbc:AuctionConstraintIndicator");

        fragments.push(
            lot_fragment(&id)
                .set_opt("submissionTerms.variantPolicy", variants)
                .set_opt("techniques.hasFrameworkAgreement", system("framework-agreement"))
                .set_opt("techniques.hasDynamicPurchasingSystem", system("dps"))
                .set_opt("techniques.hasElectronicAuction", auction)
                .set_opt(
                    "techniques.electronicAuction.description",
                    find_text(lot, "cac:TenderingProcess/cac:AuctionTerms/cbc:Description"),
                )
                .set_opt(
                    "techniques.electronicAuction.url",
                    find_text(lot, "cac:TenderingProcess/cac:AuctionTerms/cbc:AuctionURI"),
                ),
        );
    }
    Ok(fragments)
}

/// BT-539 type, BT-734 name, BT-540 description, BT-541 numbers,
/// BT-543 / BT-733 weighting and ordering notes
pub fn award_criteria(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (id, lot) in project_lots(ctx.root(), LOT) {
        let Some(criterion) = find_node(lot, "cac:TenderingTerms/cac:AwardingTerms/cac:AwardingCriterion")
        else {
            continue;
        };
        let mut fragment = lot_fragment(&id)
            .set_opt("awardCriteria.weightingDescription", find_text(criterion, "cbc:CalculationExpression"))
            .set_opt("awardCriteria.orderRationale", find_text(criterion, "cbc:Description"));

        for sub in find_nodes(criterion, "cac:SubordinateAwardingCriterion") {
            let kind = find_text(sub, "cbc:AwardingCriterionTypeCode")
                .and_then(|code| codes::award_criterion_type(&code));
            let numbers: Vec<Value> = find_nodes(
                sub,
                &format!("{}/efac:AwardCriterionParameter", crate::source::EFORMS_EXTENSION),
            )
            .into_iter()
            .filter_map(criterion_number)
            .collect();

            fragment = fragment.append(
                "awardCriteria.criteria",
                json!({
                    "type": kind,
                    "name": find_text(sub, "cbc:Name"),
                    "description": find_text(sub, "cbc:Description"),
                    "numbers": numbers,
                }),
            );
        }
        fragments.push(fragment);
    }
    Ok(fragments)
}

fn criterion_number(parameter: Node<'_, '_>) -> Option<Value> {
    let value = number(parameter, "efbc:ParameterNumeric")?;
    let code = find_text(parameter, "efbc:ParameterCode");
    let key = match find_attribute(parameter, "efbc:ParameterCode", "listName").as_deref() {
        Some("number-weight") => "weight",
        Some("number-fixed") => "fixed",
        Some("number-threshold") => "threshold",
        _ => return Some(json!({ "number": value })),
    };
    let mut object = json!({ "number": value });
    if let (Some(map), Some(code)) = (object.as_object_mut(), code) {
        map.insert(key.to_string(), Value::String(code));
    }
    Some(object)
}

/// BT-131 tender deadline (BT-1311 request deadline when there is none),
/// BT-132 public opening
pub fn deadlines(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (id, lot) in project_lots(ctx.root(), LOT) {
        let Some(process) = find_node(lot, "cac:TenderingProcess") else {
            continue;
        };
        let tender_deadline = timestamp(
            process,
            "cac:TenderSubmissionDeadlinePeriod/cbc:EndDate",
            "cac:TenderSubmissionDeadlinePeriod/cbc:EndTime",
            dates::END_OF_DAY,
        )
        .or_else(|| {
            timestamp(
                process,
                "cac:ParticipationRequestReceptionPeriod/cbc:EndDate",
                "cac:ParticipationRequestReceptionPeriod/cbc:EndTime",
                dates::END_OF_DAY,
            )
        });
        let opening = timestamp(
            process,
            "cac:OpenTenderEvent/cbc:OccurrenceDate",
            "cac:OpenTenderEvent/cbc:OccurrenceTime",
            dates::START_OF_DAY,
        );

        fragments.push(
            lot_fragment(&id)
                .set_opt("tenderPeriod.endDate", tender_deadline)
                .set_opt("awardPeriod.startDate", opening.clone())
                .set_opt("bidOpening.date", opening)
                .set_opt(
                    "bidOpening.location.description",
                    find_text(process, "cac:OpenTenderEvent/cac:OccurenceLocation/cbc:Description"),
                ),
        );
    }
    Ok(fragments)
}

/// BT-97 languages, BT-17 e-submission, BT-71 reserved, BT-75 guarantee
pub fn submission_terms(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (id, lot) in project_lots(ctx.root(), LOT) {
        let languages: Vec<&str> = find_texts(lot, "cac:TenderingTerms/cac:Language/cbc:ID")
            .iter()
            .filter_map(|code| codes::language_code(code))
            .collect();
        let electronic = find_text(
            lot,
            "cac:TenderingProcess/cbc:SubmissionMethodCode[@listName='esubmission']",
        )
        .and_then(|code| match code.as_str() {
            "required" => Some("required"),
            "allowed" => Some("allowed"),
            "not-allowed" => Some("notAllowed"),
            _ => None,
        });
        let reserved: Vec<&str> = find_texts(
            lot,
            "cac:TenderingTerms/cac:TendererQualificationRequest/cac:SpecificTendererRequirement/cbc:TendererRequirementTypeCode[@listName='reserved-procurement']",
        )
        .iter()
        .filter_map(|code| codes::reserved_participation(code))
        .collect();

        fragments.push(
            lot_fragment(&id)
                .union("submissionTerms.languages", languages)
                .set_opt("submissionTerms.electronicSubmissionPolicy", electronic)
                .union("otherRequirements.reservedParticipation", reserved)
                .set_opt(
                    "submissionTerms.depositsGuarantees",
                    find_text(lot, "cac:TenderingTerms/cac:RequiredFinancialGuarantee/cbc:Description"),
                ),
        );
    }
    Ok(fragments)
}

// ============================================================================
// GROUPS & PARTS
// ============================================================================

/// BT-330 / BT-1375 group composition, BT-157 group maximum value
pub fn lot_groups(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();

    for group in find_nodes(ctx.root(), "cac:TenderingTerms/cac:LotDistribution/cac:LotsGroup") {
        let Some(group_id) = find_text(group, "cbc:LotsGroupID") else {
            continue;
        };
        let lots = find_texts(group, "cac:ProcurementProjectLotReference/cbc:ID[@schemeName='Lot']");
        fragments.push(Fragment::entity(EntityKind::LotGroup, group_id).union("relatedLots", lots));
    }

    for (group_id, group) in project_lots(ctx.root(), LOTS_GROUP) {
        let maximum = amount(
            group,
            "cac:ProcurementProject/cac:RequestedTenderTotal/cbc:EstimatedOverallContractAmount",
        );
        fragments.push(Fragment::entity(EntityKind::LotGroup, group_id).set_opt("maximumValue", maximum));
    }

    Ok(fragments)
}

/// Part-scheme subdivisions (prior information notices); only their values
/// are used, for the procedure total
pub fn parts(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    Ok(project_lots(ctx.root(), PART)
        .into_iter()
        .map(|(id, part)| {
            Fragment::entity(EntityKind::Part, id)
                .set_opt("title", find_text(part, "cac:ProcurementProject/cbc:Name"))
                .set_opt(
                    "value",
                    amount(
                        part,
                        "cac:ProcurementProject/cac:RequestedTenderTotal/cbc:EstimatedOverallContractAmount",
                    ),
                )
        })
        .collect())
}

// ============================================================================
// DOCUMENTS
// ============================================================================

/// BT-14 restriction, BT-15 / BT-615 URLs, BT-707 restriction justification
///
/// The public and restricted variants of one document share its id and
/// merge into a single record.
pub fn documents(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for lot in find_nodes(ctx.root(), "cac:ProcurementProjectLot") {
        let lot_id = find_text(lot, "cbc:ID[@schemeName='Lot']");
        for reference in find_nodes(lot, "cac:TenderingTerms/cac:CallForTendersDocumentReference") {
            let Some(doc_id) = find_text(reference, "cbc:ID") else {
                continue;
            };
            let url = find_text(reference, "cac:Attachment/cac:ExternalReference/cbc:URI");
            let restricted = find_text(reference, "cbc:DocumentType").as_deref() == Some("restricted-document");

            let mut document = Fragment::entity(EntityKind::Document, doc_id)
                .set("documentType", "biddingDocuments")
                .union("relatedLots", lot_id.clone());
            document = if restricted {
                document.set_opt("accessDetailsURL", url).set_opt(
                    "accessDetails",
                    find_text(
                        reference,
                        "cbc:DocumentTypeCode[@listName='communication-justification']",
                    ),
                )
            } else {
                document.set_opt("url", url)
            };
            fragments.push(document);
        }
    }
    Ok(fragments)
}

// ============================================================================
// TESTS
// ============================================================================
