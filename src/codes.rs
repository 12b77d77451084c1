// 📚 Code Tables - eForms enumerations → release vocabulary
//
// Pure data. Every lookup returns `None` for codes it does not know; callers
// decide whether an unknown code is dropped or passed through.

// ============================================================================
// LANGUAGES & COUNTRIES
// ============================================================================

/// ISO 639-3 (eForms) → ISO 639-1 (release)
pub fn language_code(iso3: &str) -> Option<&'static str> {
    let code = match iso3.to_ascii_uppercase().as_str() {
        "BUL" => "bg",
        "CES" => "cs",
        "DAN" => "da",
        "DEU" => "de",
        "ELL" => "el",
        "ENG" => "en",
        "EST" => "et",
        "FIN" => "fi",
        "FRA" => "fr",
        "GLE" => "ga",
        "HRV" => "hr",
        "HUN" => "hu",
        "ISL" => "is",
        "ITA" => "it",
        "LAV" => "lv",
        "LIT" => "lt",
        "MLT" => "mt",
        "NLD" => "nl",
        "NOR" => "no",
        "POL" => "pl",
        "POR" => "pt",
        "RON" => "ro",
        "SLK" => "sk",
        "SLV" => "sl",
        "SPA" => "es",
        "SWE" => "sv",
        "CAT" => "ca",
        "EUS" => "eu",
        "GLG" => "gl",
        "LTZ" => "lb",
        "RUS" => "ru",
        "UKR" => "uk",
        "TUR" => "tr",
        _ => return None,
    };
    Some(code)
}

/// ISO 3166-1 alpha-3 (eForms) → alpha-2 (release)
pub fn country_code(iso3: &str) -> Option<&'static str> {
    let code = match iso3.to_ascii_uppercase().as_str() {
        "AUT" => "AT",
        "BEL" => "BE",
        "BGR" => "BG",
        "HRV" => "HR",
        "CYP" => "CY",
        "CZE" => "CZ",
        "DNK" => "DK",
        "EST" => "EE",
        "FIN" => "FI",
        "FRA" => "FR",
        "DEU" => "DE",
        "GRC" => "GR",
        "HUN" => "HU",
        "IRL" => "IE",
        "ITA" => "IT",
        "LVA" => "LV",
        "LTU" => "LT",
        "LUX" => "LU",
        "MLT" => "MT",
        "NLD" => "NL",
        "POL" => "PL",
        "PRT" => "PT",
        "ROU" => "RO",
        "SVK" => "SK",
        "SVN" => "SI",
        "ESP" => "ES",
        "SWE" => "SE",
        "ISL" => "IS",
        "LIE" => "LI",
        "NOR" => "NO",
        "CHE" => "CH",
        "GBR" => "GB",
        "USA" => "US",
        "CAN" => "CA",
        "CHN" => "CN",
        "JPN" => "JP",
        "TUR" => "TR",
        "UKR" => "UA",
        "SRB" => "RS",
        "MKD" => "MK",
        "MNE" => "ME",
        "ALB" => "AL",
        "BIH" => "BA",
        "MDA" => "MD",
        _ => return None,
    };
    Some(code)
}

// ============================================================================
// BUYER CLASSIFICATIONS
// ============================================================================

/// BT-11 buyer legal type description
pub fn buyer_legal_type(code: &str) -> Option<&'static str> {
    let description = match code {
        "body-pl" => "Body governed by public law",
        "body-pl-cga" => "Body governed by public law, controlled by a central government authority",
        "body-pl-la" => "Body governed by public law, controlled by a local authority",
        "body-pl-ra" => "Body governed by public law, controlled by a regional authority",
        "cga" => "Central government authority",
        "def-cont" => "Defence contractor",
        "eu-comp" => "EU institution, body or agency",
        "eu-ins-bod-ag" => "EU institution, body or agency",
        "grp-p-aut" => "Group of public authorities",
        "int-org" => "International organisation",
        "la" => "Local authority",
        "org-sub" => "Organisation awarding a contract subsidised by a contracting authority",
        "org-sub-cga" => "Organisation awarding a contract subsidised by a central government authority",
        "org-sub-la" => "Organisation awarding a contract subsidised by a local authority",
        "org-sub-ra" => "Organisation awarding a contract subsidised by a regional authority",
        "pub-undert" => "Public undertaking",
        "pub-undert-cga" => "Public undertaking, controlled by a central government authority",
        "pub-undert-la" => "Public undertaking, controlled by a local authority",
        "pub-undert-ra" => "Public undertaking, controlled by a regional authority",
        "ra" => "Regional authority",
        "rl-aut" => "Regional or local authority",
        "spec-rights-entity" => "Entity with special or exclusive rights",
        _ => return None,
    };
    Some(description)
}

/// Classification produced for a buyer's main activity (BT-10 / BT-610)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityClass {
    pub scheme: &'static str,
    pub id: &'static str,
    pub description: &'static str,
}

/// BT-10 authority activity → COFOG division
pub fn authority_activity(code: &str) -> Option<ActivityClass> {
    let (id, description) = match code {
        "gen-pub" => ("01", "General public services"),
        "defence" => ("02", "Defence"),
        "pub-os" => ("03", "Public order and safety"),
        "econ-aff" => ("04", "Economic affairs"),
        "env-pro" => ("05", "Environmental protection"),
        "hc-am" => ("06", "Housing and community amenities"),
        "health" => ("07", "Health"),
        "rcr" => ("08", "Recreation, culture and religion"),
        "education" => ("09", "Education"),
        "soc-pro" => ("10", "Social protection"),
        _ => return None,
    };
    Some(ActivityClass {
        scheme: "COFOG",
        id,
        description,
    })
}

/// BT-610 entity (utilities) activity
pub fn entity_activity(code: &str) -> Option<ActivityClass> {
    let (id, description) = match code {
        "airport" => ("airport", "Airport-related activities"),
        "coal" => ("coal", "Exploration or extraction of coal or other solid fuels"),
        "electricity" => ("electricity", "Electricity"),
        "gas-heat" => ("gas-heat", "Production, transport or distribution of gas or heat"),
        "gas-oil" => ("gas-oil", "Extraction of gas or oil"),
        "port" => ("port", "Port-related activities"),
        "post" => ("post", "Postal services"),
        "rail" => ("rail", "Railway services"),
        "urttb" => ("urttb", "Urban railway, tramway, trolleybus or bus services"),
        "water" => ("water", "Water"),
        _ => return None,
    };
    Some(ActivityClass {
        scheme: "eu-main-activity",
        id,
        description,
    })
}

// ============================================================================
// PROCEDURE
// ============================================================================

/// BT-01 legal basis → identifier scheme
///
/// CELEX numbers look like `32014L0024` (sector 3, year, type letter, number).
pub fn legal_basis_scheme(code: &str) -> &'static str {
    let bytes = code.as_bytes();
    let is_celex = bytes.len() >= 10
        && bytes[0] == b'3'
        && bytes[1..5].iter().all(u8::is_ascii_digit)
        && bytes[5].is_ascii_uppercase();
    if is_celex {
        "CELEX"
    } else {
        "eu-legal-basis"
    }
}

/// BT-105 procedure type → (procurementMethod, procurementMethodDetails)
pub fn procedure_type(code: &str) -> Option<(&'static str, &'static str)> {
    let mapped = match code {
        "open" => ("open", "Open procedure"),
        "restricted" => ("selective", "Restricted procedure"),
        "neg-w-call" => (
            "selective",
            "Negotiated with prior publication of a call for competition / competitive with negotiation",
        ),
        "neg-wo-call" => (
            "limited",
            "Negotiated without prior call for competition",
        ),
        "comp-dial" => ("selective", "Competitive dialogue"),
        "innovation" => ("selective", "Innovation partnership"),
        "oth-single" => ("limited", "Other single stage procedure"),
        "oth-mult" => ("selective", "Other multiple stage procedure"),
        "exp-int-rail" => ("selective", "Expression of interest – rail"),
        _ => return None,
    };
    Some(mapped)
}

/// BT-136 direct award justification description
pub fn direct_award_justification(code: &str) -> Option<&'static str> {
    let description = match code {
        "additional" => "Need for additional works or services by the original contractor",
        "art-creat" => "The contract can only be provided by a particular economic operator because of creation or acquisition of a unique work of art or artistic performance",
        "bargain" => "Bargain purchase taking advantage of a particularly advantageous opportunity available for a very short time at a price considerably lower than market prices",
        "below-thr" => "Contract below the procurement thresholds",
        "contest" => "The contract follows a design contest and is awarded to the winner or one of the winners",
        "exclusive" => "The contract can only be provided by a particular economic operator because of exclusive rights",
        "irregular" => "Only irregular or unacceptable tenders were received in response to the previous notice",
        "liquid-rs" => "Purchase of supplies or services on particularly advantageous terms from an economic operator winding up its business activities",
        "no-tenders" => "No tenders or no suitable tenders/requests to participate in response to the previous notice",
        "repetition" => "New works or services, constituting a repetition of existing works or services",
        "technical" => "The contract can only be provided by a particular economic operator because of an absence of competition for technical reasons",
        "urgency" => "Extreme urgency brought about by events unforeseeable for the buyer",
        "other" => "Other justification",
        _ => return None,
    };
    Some(description)
}

/// BT-02 notice subtype / BT-03 form type → release tags
pub fn release_tags(notice_type: Option<&str>, form_type: Option<&str>) -> Vec<&'static str> {
    if let Some(form) = form_type {
        match form {
            "planning" => return vec!["planning"],
            "competition" => return vec!["tender"],
            "result" => return vec!["award", "contract"],
            "cont-modif" => return vec!["contractAmendment"],
            "change" => return vec!["tenderUpdate"],
            "dir-awa-pre" => return vec!["award"],
            _ => {}
        }
    }
    match notice_type {
        Some(t) if t.starts_with("pin") => vec!["planning"],
        Some(t) if t.starts_with("can") => vec!["award", "contract"],
        Some("veat") => vec!["award"],
        Some("corr") => vec!["tenderUpdate"],
        _ => vec!["tender"],
    }
}

/// BT-23 main nature → mainProcurementCategory
pub fn procurement_category(code: &str) -> Option<&'static str> {
    match code {
        "works" => Some("works"),
        "supplies" => Some("goods"),
        "services" => Some("services"),
        _ => None,
    }
}

/// BT-71 reserved participation
pub fn reserved_participation(code: &str) -> Option<&'static str> {
    match code {
        "res-pub-ser" => Some("publicServiceMissionOrganization"),
        "res-ws" => Some("shelteredWorkshop"),
        _ => None,
    }
}

/// BT-539 award criterion type → release criterion type
pub fn award_criterion_type(code: &str) -> Option<&'static str> {
    match code {
        "price" => Some("price"),
        "cost" => Some("cost"),
        "quality" => Some("quality"),
        _ => None,
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// BT-142 winner chosen → award status
pub fn award_status(code: &str) -> Option<&'static str> {
    match code {
        "selec-w" => Some("active"),
        "clos-nw" => Some("unsuccessful"),
        "open-nw" => Some("pending"),
        _ => None,
    }
}

/// BT-144 reason for not awarding
pub fn non_award_reason(code: &str) -> Option<&'static str> {
    let description = match code {
        "no-rece" => "No tenders, requests to participate or projects were received",
        "all-rej" => "All tenders, requests to participate or projects were withdrawn or found inadmissible",
        "chan-need" => "Decision of the buyer, because of a change in the buyer's needs",
        "no-fina" => "Decision of the buyer, because of insufficient funds",
        "ins-rev" => "Decision of the buyer following a tenderer's request to review the procedure",
        "other" => "Other reason (decision to stop the procedure)",
        "rev-body" => "Decision of a review body or another judicial body",
        _ => return None,
    };
    Some(description)
}

/// BT-759/BT-760 statistics code → bid statistics measure
pub fn statistics_measure(code: &str) -> Option<&'static str> {
    match code {
        "tenders" => Some("bids"),
        "t-sme" => Some("smeBids"),
        "t-micro" => Some("microBids"),
        "t-small" => Some("smallBids"),
        "t-med" => Some("mediumBids"),
        "t-esubm" => Some("electronicBids"),
        "t-oth-eea" => Some("foreignBidsFromEU"),
        "t-no-eea" => Some("foreignBidsFromNonEU"),
        "part-req" => Some("requests"),
        "rec-na" => Some("disqualifiedBids"),
        "t-verif-inad" => Some("tendersVerifiedInadmissible"),
        "t-verif-inad-low" => Some("tendersVerifiedInadmissibleLowPrice"),
        _ => None,
    }
}

/// BT-140 change reason description
pub fn change_reason(code: &str) -> Option<&'static str> {
    let description = match code {
        "add-info" => "Additional information",
        "alt-buy" => "Alteration of the buyer",
        "cancel" => "Notice cancelled",
        "cancel-intent" => "Cancellation intention",
        "cor-buy" => "Buyer correction",
        "cor-esen" => "eSender correction",
        "cor-pub" => "Publications Office correction",
        "info-release" => "Information now available",
        "other" => "Other",
        "update-add" => "Information updated",
        _ => return None,
    };
    Some(description)
}

/// BT-165 company size → party scale
pub fn company_size(code: &str) -> Option<&'static str> {
    match code {
        "micro" => Some("micro"),
        "small" => Some("small"),
        "medium" => Some("medium"),
        "large" => Some("large"),
        _ => None,
    }
}

/// OPT-030 service provider type → party role
pub fn service_provider_role(code: &str) -> Option<&'static str> {
    match code {
        "serv-prov" => Some("procuringEntity"),
        "ted-esen" => Some("eSender"),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
