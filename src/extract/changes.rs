// 📝 Change Extractors - Amendment records from a change notice
//
// One amendment per changed section. The section identifier decides the
// parent: `LOT-` → lot, `RES-` → award, anything else → tender.

use super::ExtractContext;
use crate::codes;
use crate::fragment::{AmendmentParent, Fragment};
use crate::source::{find_nodes, find_text, find_texts};
use anyhow::Result;
use serde_json::{json, Value};

fn parent_of(section: &str) -> AmendmentParent {
    if section.starts_with("LOT-") {
        AmendmentParent::Lot(section.to_string())
    } else if section.starts_with("RES-") {
        AmendmentParent::Award(section.to_string())
    } else {
        AmendmentParent::Tender
    }
}

/// BT-13716 section, BT-141 description, BT-140 / BT-762 reason,
/// BT-758 changed notice
pub fn changes(ctx: &ExtractContext) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();

    for block in ctx.extension_nodes("efac:Changes") {
        let amends = find_text(block, "efbc:ChangedNoticeIdentifier");
        let rationale = find_text(block, "efac:ChangeReason/efbc:ReasonDescription");
        let classifications: Vec<Value> = find_texts(block, "efac:ChangeReason/cbc:ReasonCode")
            .into_iter()
            .map(|code| {
                json!({
                    "scheme": "eu-change-corrig-justification",
                    "description": codes::change_reason(&code),
                    "id": code,
                })
            })
            .collect();

        for change in find_nodes(block, "efac:Change") {
            let description = find_text(change, "efbc:ChangeDescription");
            let mut sections = find_texts(change, "efac:ChangedSection/efbc:ChangedSectionIdentifier");
            if sections.is_empty() {
                // no section: the change concerns the procedure as a whole
                sections.push(String::new());
            }

            for section in sections {
                fragments.push(
                    Fragment::amendment(parent_of(&section))
                        .set_opt("description", description.clone())
                        .set_opt("rationale", rationale.clone())
                        .set_opt("amendsReleaseID", amends.clone())
                        .union("rationaleClassifications", classifications.clone()),
                );
            }
        }
    }

    Ok(fragments)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::{create_test_extension, create_test_notice, run_rule};
    use crate::fragment::Target;

    #[test]
    fn test_parent_from_section_prefix() {
        assert_eq!(parent_of("LOT-0001"), AmendmentParent::Lot("LOT-0001".into()));
        assert_eq!(parent_of("RES-0002"), AmendmentParent::Award("RES-0002".into()));
        assert_eq!(parent_of("GLO-0001"), AmendmentParent::Tender);
        assert_eq!(parent_of(""), AmendmentParent::Tender);
    }

    #[test]
    fn test_one_amendment_per_section() {
        let xml = create_test_notice(&create_test_extension(
            r#"<efac:Changes>
                 <efbc:ChangedNoticeIdentifier>abc-01</efbc:ChangedNoticeIdentifier>
                 <efac:Change>
                   <efbc:ChangeDescription>Deadline extended</efbc:ChangeDescription>
                   <efac:ChangedSection><efbc:ChangedSectionIdentifier>LOT-0001</efbc:ChangedSectionIdentifier></efac:ChangedSection>
                   <efac:ChangedSection><efbc:ChangedSectionIdentifier>LOT-0002</efbc:ChangedSectionIdentifier></efac:ChangedSection>
                 </efac:Change>
                 <efac:Change><efbc:ChangeDescription>General fix</efbc:ChangeDescription></efac:Change>
                 <efac:ChangeReason><cbc:ReasonCode listName="change-corrig-justification">cor-buy</cbc:ReasonCode></efac:ChangeReason>
               </efac:Changes>"#,
        ));
        let fragments = run_rule(&xml, changes);
        let parents: Vec<Target> = fragments.iter().map(|f| f.target.clone()).collect();
        assert_eq!(
            parents,
            vec![
                Target::Amendment {
                    parent: AmendmentParent::Lot("LOT-0001".into())
                },
                Target::Amendment {
                    parent: AmendmentParent::Lot("LOT-0002".into())
                },
                Target::Amendment {
                    parent: AmendmentParent::Tender
                },
            ]
        );
    }
}
