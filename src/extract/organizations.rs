// 🏛️ Organization Extractors - Parties and the roles they play
//
// Phase 2 registers every organization (OPT-200) so that the role rules of
// phase 3 only ever ADD roles and classifications to known parties.

use super::ExtractContext;
use crate::codes;
use crate::fragment::Fragment;
use crate::source::{find_node, find_nodes, find_text, find_texts, text_of};
use anyhow::Result;
use roxmltree::Node;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Name of the synthetic party funding EU-financed lots
pub const EU_FUNDER_NAME: &str = "European Union";

/// OPT-301 organization references under a lot's `cac:TenderingTerms`
const LOT_ROLES: &[(&str, &str)] = &[
    ("cac:AppealTerms/cac:AppealReceiverParty", "reviewBody"),
    ("cac:AppealTerms/cac:MediationParty", "mediationBody"),
    ("cac:AppealTerms/cac:AppealInformationParty", "reviewContactPoint"),
    ("cac:TenderRecipientParty", "submissionReceiptBody"),
    ("cac:AdditionalInformationParty", "processContactPoint"),
    ("cac:DocumentProviderParty", "processContactPoint"),
    ("cac:TenderEvaluationParty", "evaluationBody"),
    ("cac:FiscalLegislationDocumentReference/cac:IssuerParty", "informationService"),
    ("cac:EnvironmentalLegislationDocumentReference/cac:IssuerParty", "informationService"),
    ("cac:EmploymentLegislationDocumentReference/cac:IssuerParty", "informationService"),
];

// ============================================================================
// PHASE 2: ORGANIZATIONS
// ============================================================================

/// OPT-200 and the company fields (BT-500..BT-514, BT-165, BT-633)
pub fn organizations(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();

    for organization in ctx.extension_nodes("efac:Organizations/efac:Organization") {
        let Some(company) = find_node(organization, "efac:Company") else {
            continue;
        };
        let Some(id) = find_text(company, "cac:PartyIdentification/cbc:ID") else {
            tracing::debug!("Organization without identifier skipped");
            continue;
        };

        let name = find_text(company, "cac:PartyName/cbc:Name");
        let mut party = Fragment::party(id).set_opt("name", name.clone());

        if let Some(company_id) = find_text(company, "cac:PartyLegalEntity/cbc:CompanyID") {
            party = party.merge(
                "identifier",
                json!({ "id": company_id, "scheme": "internal", "legalName": name }),
            );
        }
        if let Some(address) = find_node(company, "cac:PostalAddress") {
            party = party.merge("address", postal_address(address));
        }
        if let Some(contact) = find_node(company, "cac:Contact") {
            party = party.merge(
                "contactPoint",
                json!({
                    "name": find_text(contact, "cbc:Name"),
                    "telephone": find_text(contact, "cbc:Telephone"),
                    "email": find_text(contact, "cbc:ElectronicMail"),
                    "faxNumber": find_text(contact, "cbc:Telefax"),
                }),
            );
        }

        let scale = find_text(company, "efbc:CompanySizeCode").and_then(|c| codes::company_size(&c));
        let natural_person = super::indicator(organization, "efbc:NaturalPersonIndicator") == Some(true);
        party = party
            .set_opt("details.url", find_text(company, "cbc:WebsiteURI"))
            .set_opt("details.scale", scale)
            .set_opt("details.scale", natural_person.then_some("selfEmployed"));

        fragments.push(party);
    }

    Ok(fragments)
}

pub(crate) fn postal_address(address: Node<'_, '_>) -> Value {
    let mut street: Vec<String> = Vec::new();
    street.extend(find_text(address, "cbc:StreetName"));
    street.extend(find_text(address, "cbc:AdditionalStreetName"));
    street.extend(find_texts(address, "cac:AddressLine/cbc:Line"));

    let country = find_text(address, "cac:Country/cbc:IdentificationCode")
        .and_then(|code| codes::country_code(&code));

    json!({
        "streetAddress": (!street.is_empty()).then(|| street.join(", ")),
        "locality": find_text(address, "cbc:CityName"),
        "postalCode": find_text(address, "cbc:PostalZone"),
        "region": find_text(address, "cbc:CountrySubentityCode"),
        "country": country,
    })
}

/// OPT-202 owners joined to organizations through OPT-302
pub fn beneficial_owners(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let owners: HashMap<String, Node> = ctx
        .extension_nodes("efac:Organizations/efac:UltimateBeneficialOwner")
        .into_iter()
        .filter_map(|owner| find_text(owner, "cbc:ID").map(|id| (id, owner)))
        .collect();
    if owners.is_empty() {
        return Ok(Vec::new());
    }

    let mut fragments = Vec::new();
    for organization in ctx.extension_nodes("efac:Organizations/efac:Organization") {
        let Some(org_id) = find_text(organization, "efac:Company/cac:PartyIdentification/cbc:ID") else {
            continue;
        };
        let mut party = Fragment::party(org_id);
        for reference in find_texts(organization, "efac:UltimateBeneficialOwner/cbc:ID") {
            let Some(owner) = owners.get(&reference) else {
                tracing::debug!(owner = %reference, "Unknown beneficial owner reference");
                continue;
            };
            party = party.append("beneficialOwners", beneficial_owner(&reference, *owner));
        }
        if !party.is_empty() {
            fragments.push(party);
        }
    }
    Ok(fragments)
}

fn beneficial_owner(id: &str, owner: Node<'_, '_>) -> Value {
    let name: Vec<String> = [
        find_text(owner, "cbc:FirstName"),
        find_text(owner, "cbc:FamilyName"),
    ]
    .into_iter()
    .flatten()
    .collect();
    let nationalities: Vec<&str> = find_texts(owner, "efac:Nationality/cbc:NationalityID")
        .iter()
        .filter_map(|code| codes::country_code(code))
        .collect();

    json!({
        "id": id,
        "name": (!name.is_empty()).then(|| name.join(" ")),
        "nationalities": nationalities,
    })
}

// ============================================================================
// PHASE 3: ROLES
// ============================================================================

fn buyer_ids<'a, 'i>(ctx: &ExtractContext<'a, 'i>) -> Vec<(String, Node<'a, 'i>)> {
    find_nodes(ctx.root(), "cac:ContractingParty")
        .into_iter()
        .filter_map(|party| {
            find_text(party, "cac:Party/cac:PartyIdentification/cbc:ID").map(|id| (id, party))
        })
        .collect()
}

/// OPT-300 buyer reference
pub fn buyers(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    Ok(buyer_ids(ctx)
        .into_iter()
        .map(|(id, _)| Fragment::party(id).union("roles", ["buyer"]))
        .collect())
}

/// BT-11 legal type, BT-10 / BT-610 main activity
pub fn buyer_classifications(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for (id, contracting_party) in buyer_ids(ctx) {
        let mut classifications = Vec::new();

        for code in find_texts(
            contracting_party,
            "cac:ContractingPartyType/cbc:PartyTypeCode[@listName='buyer-legal-type']",
        ) {
            classifications.push(json!({
                "scheme": "TED_CA_TYPE",
                "id": code,
                "description": codes::buyer_legal_type(&code),
            }));
        }

        for activity in find_nodes(contracting_party, "cac:ContractingActivity/cbc:ActivityTypeCode") {
            let Some(code) = text_of(activity) else {
                continue;
            };
            let class = match activity.attribute("listName") {
                Some("entity-activity") => codes::entity_activity(&code),
                _ => codes::authority_activity(&code),
            };
            match class {
                Some(class) => classifications.push(json!({
                    "scheme": class.scheme,
                    "id": class.id,
                    "description": class.description,
                })),
                None => tracing::debug!(code = %code, "Unknown buyer activity"),
            }
        }

        fragments.push(Fragment::party(id).union("details.classifications", classifications));
    }
    Ok(fragments)
}

/// OPT-030 service provider type, OPT-300 service provider reference
pub fn service_providers(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for provider in find_nodes(ctx.root(), "cac:ContractingParty/cac:Party/cac:ServiceProviderParty") {
        let role = find_text(provider, "cbc:ServiceTypeCode").and_then(|c| codes::service_provider_role(&c));
        let id = find_text(provider, "cac:Party/cac:PartyIdentification/cbc:ID");
        if let (Some(role), Some(id)) = (role, id) {
            fragments.push(Fragment::party(id).union("roles", [role]));
        }
    }
    Ok(fragments)
}

/// OPT-301 lot-level organization roles
pub fn lot_roles(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for terms in find_nodes(ctx.root(), "cac:ProcurementProjectLot/cac:TenderingTerms") {
        for (path, role) in LOT_ROLES {
            let path = format!("{}/cac:PartyIdentification/cbc:ID", path);
            for id in find_texts(terms, &path) {
                fragments.push(Fragment::party(id).union("roles", [*role]));
            }
        }
    }
    Ok(fragments)
}

/// Fallback id of the EU funder party, stable across conversions
pub fn eu_funder_id() -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, EU_FUNDER_NAME.as_bytes()).to_string()
}

/// BT-60: EU-funded lots add the EU as a funder party, located by name
pub fn eu_funder(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let eu_funded = find_texts(
        ctx.root(),
        "cac:ProcurementProjectLot/cac:TenderingTerms/cbc:FundingProgramCode[@listName='eu-funded']",
    )
    .iter()
    .any(|code| code == "eu-funds");

    if !eu_funded {
        return Ok(Vec::new());
    }
    Ok(vec![Fragment::party_named(EU_FUNDER_NAME, eu_funder_id())
        .set("name", EU_FUNDER_NAME)
        .union("roles", ["funder"])])
}

// ============================================================================
// TESTS
// ============================================================================
