// 📰 Notice Extractors - Release envelope and procedure-level tender fields
//
// Scalar rules only: every value comes straight from the notice root or its
// procedure-level `cac:ProcurementProject` / `cac:TenderingProcess`.

use super::{amount, classification, integer, timestamp, ExtractContext};
use crate::codes;
use crate::dates;
use crate::fragment::Fragment;
use crate::source::{find_attribute, find_node, find_nodes, find_text, find_texts, text_of};
use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

/// BT-701 / BT-757: release id = notice id, suffixed with the version
pub fn release_id(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let Some(notice_id) = find_text(ctx.root(), "cbc:ID") else {
        return Ok(Vec::new());
    };
    let id = match find_text(ctx.root(), "cbc:VersionID") {
        Some(version) => format!("{}-{}", notice_id, version),
        None => notice_id,
    };
    Ok(vec![Fragment::release().set("id", id)])
}

/// BT-04: ocid from the procedure identifier; a name-based UUID of the
/// notice id stands in when the procedure identifier is missing
pub fn ocid(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let prefix = &ctx.config.ocid_prefix;
    if let Some(folder) = find_text(ctx.root(), "cbc:ContractFolderID") {
        return Ok(vec![
            Fragment::release().set("ocid", format!("{}-{}", prefix, folder)),
            Fragment::tender().set("id", folder),
        ]);
    }

    let Some(notice_id) = find_text(ctx.root(), "cbc:ID") else {
        return Ok(Vec::new());
    };
    let generated = Uuid::new_v5(&Uuid::NAMESPACE_OID, notice_id.as_bytes());
    tracing::debug!(notice = %notice_id, "No procedure identifier, deriving ocid from notice id");
    Ok(vec![Fragment::release().set("ocid", format!("{}-{}", prefix, generated))])
}

/// BT-05
pub fn issue_date(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let date = timestamp(ctx.root(), "cbc:IssueDate", "cbc:IssueTime", dates::START_OF_DAY);
    Ok(vec![Fragment::release().set_opt("date", date)])
}

/// BT-02 notice subtype, BT-03 form type (the code's `listName`)
pub fn release_tag(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let notice_type = find_text(ctx.root(), "cbc:NoticeTypeCode");
    let form_type = find_attribute(ctx.root(), "cbc:NoticeTypeCode", "listName");
    let tags = codes::release_tags(notice_type.as_deref(), form_type.as_deref());
    Ok(vec![Fragment::release().union("tag", tags)])
}

/// BT-702
pub fn language(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let Some(code) = find_text(ctx.root(), "cbc:NoticeLanguageCode") else {
        return Ok(Vec::new());
    };
    match codes::language_code(&code) {
        Some(iso) => Ok(vec![Fragment::release().set("language", iso)]),
        None => {
            tracing::debug!(code = %code, "Unknown notice language");
            Ok(Vec::new())
        }
    }
}

/// BT-01 legal basis and its local description
pub fn legal_basis(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut tender = Fragment::tender();

    if let Some(code) = find_text(ctx.root(), "cbc:RegulatoryDomain") {
        let scheme = codes::legal_basis_scheme(&code);
        tender = tender.merge("legalBasis", json!({ "id": code, "scheme": scheme }));
    }

    for reference in find_nodes(
        ctx.root(),
        "cac:TenderingTerms/cac:ProcurementLegislationDocumentReference",
    ) {
        let description = find_text(reference, "cbc:DocumentDescription");
        match find_text(reference, "cbc:ID").as_deref() {
            Some("LocalLegalBasis") | None => {
                tender = tender.merge("legalBasis", json!({ "description": description }));
            }
            Some(id) => {
                tender = tender.merge(
                    "legalBasis",
                    json!({ "id": id, "scheme": "ELI", "description": description }),
                );
            }
        }
    }

    Ok(vec![tender])
}

/// BT-21 title, BT-24 description, BT-22 internal identifier
pub fn procedure_project(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let Some(project) = find_node(ctx.root(), "cac:ProcurementProject") else {
        return Ok(Vec::new());
    };
    let mut tender = Fragment::tender()
        .set_opt("title", find_text(project, "cbc:Name"))
        .set_opt("description", find_text(project, "cbc:Description"));
    if let Some(internal) = find_text(project, "cbc:ID") {
        tender = tender.append("identifiers", json!({ "id": internal, "scheme": "internal" }));
    }
    Ok(vec![tender])
}

/// BT-23
pub fn main_nature(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let category = find_text(ctx.root(), "cac:ProcurementProject/cbc:ProcurementTypeCode")
        .and_then(|code| codes::procurement_category(&code));
    Ok(vec![Fragment::tender().set_opt("mainProcurementCategory", category)])
}

/// BT-27
pub fn procedure_value(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let value = amount(
        ctx.root(),
        "cac:ProcurementProject/cac:RequestedTenderTotal/cbc:EstimatedOverallContractAmount",
    );
    Ok(vec![Fragment::tender().set_opt("value", value)])
}

/// BT-262 main and BT-263 additional classifications
pub fn procedure_classification(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let main = find_node(
        ctx.root(),
        "cac:ProcurementProject/cac:MainCommodityClassification/cbc:ItemClassificationCode",
    )
    .and_then(classification);
    let additional: Vec<_> = find_nodes(
        ctx.root(),
        "cac:ProcurementProject/cac:AdditionalCommodityClassification/cbc:ItemClassificationCode",
    )
    .into_iter()
    .filter_map(classification)
    .collect();

    Ok(vec![Fragment::tender()
        .set_opt("classification", main)
        .union("additionalClassifications", additional)])
}

/// BT-105
pub fn procedure_type(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let Some(code) = find_text(ctx.root(), "cac:TenderingProcess/cbc:ProcedureCode") else {
        return Ok(Vec::new());
    };
    let Some((method, details)) = codes::procedure_type(&code) else {
        tracing::debug!(code = %code, "Unknown procedure type");
        return Ok(Vec::new());
    };
    Ok(vec![Fragment::tender()
        .set("procurementMethod", method)
        .set("procurementMethodDetails", details)])
}

/// BT-106 accelerated procedure, BT-1351 its justification
pub fn accelerated(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let Some(code) = find_node(
        ctx.root(),
        "cac:TenderingProcess/cac:ProcessJustification/cbc:ProcessReasonCode[@listName='accelerated-procedure']",
    ) else {
        return Ok(Vec::new());
    };
    let is_accelerated = text_of(code).and_then(|t| super::parse_indicator(&t));
    let rationale = code
        .parent_element()
        .and_then(|justification| find_text(justification, "cbc:ProcessReason"));

    Ok(vec![Fragment::tender()
        .set_opt("procedure.isAccelerated", is_accelerated)
        .set_opt("procedure.acceleratedRationale", rationale)])
}

/// BT-136 direct award justification code, BT-135 its text
pub fn direct_award(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut tender = Fragment::tender();
    for code_node in find_nodes(
        ctx.root(),
        "cac:TenderingProcess/cac:ProcessJustification/cbc:ProcessReasonCode[@listName='direct-award-justification']",
    ) {
        if let Some(code) = text_of(code_node) {
            tender = tender.append(
                "procurementMethodRationaleClassifications",
                json!({
                    "scheme": "eu-direct-award-justification",
                    "id": code,
                    "description": codes::direct_award_justification(&code),
                }),
            );
        }
        let rationale = code_node
            .parent_element()
            .and_then(|justification| find_text(justification, "cbc:ProcessReason"));
        tender = tender.set_opt("procurementMethodRationale", rationale);
    }
    Ok(vec![tender])
}

/// BT-31 maximum lots per tenderer, BT-33 maximum lots awarded
pub fn lot_details(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let Some(distribution) = find_node(ctx.root(), "cac:TenderingTerms/cac:LotDistribution") else {
        return Ok(Vec::new());
    };
    Ok(vec![Fragment::tender()
        .set_opt(
            "lotDetails.maximumLotsBidPerSupplier",
            integer(distribution, "cbc:MaximumLotsSubmittedNumeric"),
        )
        .set_opt(
            "lotDetails.maximumLotsAwardedPerSupplier",
            integer(distribution, "cbc:MaximumLotsAwardedNumeric"),
        )])
}

/// BT-125 previous planning notice, procedure- or lot-level
pub fn related_processes(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut identifiers: Vec<String> = Vec::new();
    for path in [
        "cac:TenderingProcess/cac:NoticeDocumentReference/cbc:ID",
        "cac:ProcurementProjectLot/cac:TenderingProcess/cac:NoticeDocumentReference/cbc:ID",
    ] {
        for identifier in find_texts(ctx.root(), path) {
            if !identifiers.contains(&identifier) {
                identifiers.push(identifier);
            }
        }
    }

    let mut release = Fragment::release();
    for (position, identifier) in identifiers.into_iter().enumerate() {
        release = release.append(
            "relatedProcesses",
            json!({
                "id": (position + 1).to_string(),
                "relationship": ["planning"],
                "scheme": "eu-oj",
                "identifier": identifier,
            }),
        );
    }
    Ok(vec![release])
}

// ============================================================================
// TESTS
// ============================================================================
