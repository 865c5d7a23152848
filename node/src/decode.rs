//! Structural decode of `constructBFTX` arguments.
//!
//! Input objects arrive as JSON maps. Each declared field is copied across
//! explicitly: absent or null fields keep the zero value, undeclared fields
//! are ignored, and a present field of the wrong JSON kind is an error.

use serde_json::{Map, Value};

use bftx_protocol::transaction::{
    AgentMaster, AgentOwner, IssueDetails, MasterInfo, Properties, Transaction,
};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{field}: expected {expected}")]
    WrongKind {
        field: String,
        expected: &'static str,
    },
}

/// Reader over one input object, tracking the field path for errors.
struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: &'a str,
}

impl<'a> Fields<'a> {
    fn at(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    fn path_of(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        }
    }

    fn text(&self, name: &str, out: &mut String) -> Result<(), DecodeError> {
        if let Some(value) = self.at(name) {
            *out = value
                .as_str()
                .ok_or_else(|| DecodeError::WrongKind {
                    field: self.path_of(name),
                    expected: "string",
                })?
                .to_string();
        }
        Ok(())
    }

    fn int(&self, name: &str, out: &mut i64) -> Result<(), DecodeError> {
        if let Some(value) = self.at(name) {
            *out = value.as_i64().ok_or_else(|| DecodeError::WrongKind {
                field: self.path_of(name),
                expected: "integer",
            })?;
        }
        Ok(())
    }

    fn object(&self, name: &str) -> Result<Option<&'a Map<String, Value>>, DecodeError> {
        match self.at(name) {
            None => Ok(None),
            Some(value) => value.as_object().map(Some).ok_or_else(|| DecodeError::WrongKind {
                field: self.path_of(name),
                expected: "object",
            }),
        }
    }
}

fn person(
    fields: &Fields<'_>,
    first_name: &mut String,
    last_name: &mut String,
    sig: &mut String,
) -> Result<(), DecodeError> {
    fields.text("FirstName", first_name)?;
    fields.text("LastName", last_name)?;
    fields.text("Sig", sig)
}

fn nested<'a>(
    parent: &Fields<'a>,
    name: &str,
    path: &'a mut String,
) -> Result<Option<Fields<'a>>, DecodeError> {
    *path = parent.path_of(name);
    let path: &'a str = path;
    Ok(parent.object(name)?.map(|map| Fields { map, path }))
}

/// Decodes a `PropertiesInput` JSON object.
pub fn decode_properties(input: &Map<String, Value>) -> Result<Properties, DecodeError> {
    let f = Fields {
        map: input,
        path: "Properties",
    };
    let mut p = Properties::default();

    f.text("Shipper", &mut p.shipper)?;
    f.text("BolNum", &mut p.bol_num)?;
    f.text("RefNum", &mut p.ref_num)?;
    f.text("Consignee", &mut p.consignee)?;
    f.text("HouseBill", &mut p.house_bill)?;
    f.text("Vessel", &mut p.vessel)?;
    f.text("PortLoading", &mut p.port_loading)?;
    f.text("PortDischarge", &mut p.port_discharge)?;
    f.text("NotifyAddress", &mut p.notify_address)?;
    f.text("DescOfGoods", &mut p.desc_of_goods)?;
    f.int("GrossWeight", &mut p.gross_weight)?;
    f.int("FreightPayableAmt", &mut p.freight_payable_amt)?;
    f.int("FreightAdvAmt", &mut p.freight_adv_amt)?;
    f.text("GeneralInstructions", &mut p.general_instructions)?;
    f.text("DateShipped", &mut p.date_shipped)?;
    f.int("NumBol", &mut p.num_bol)?;

    let mut path = String::new();
    if let Some(issue) = nested(&f, "IssueDetails", &mut path)? {
        let IssueDetails {
            place_of_issue,
            date_of_issue,
        } = &mut p.issue_details;
        issue.text("PlaceOfIssue", place_of_issue)?;
        issue.text("DateOfIssue", date_of_issue)?;
    }

    let mut path = String::new();
    if let Some(master) = nested(&f, "MasterInfo", &mut path)? {
        let MasterInfo {
            first_name,
            last_name,
            sig,
        } = &mut p.master_info;
        person(&master, first_name, last_name, sig)?;
    }

    let mut path = String::new();
    if let Some(agent) = nested(&f, "AgentForMaster", &mut path)? {
        let AgentMaster {
            first_name,
            last_name,
            sig,
        } = &mut p.agent_for_master;
        person(&agent, first_name, last_name, sig)?;
    }

    let mut path = String::new();
    if let Some(agent) = nested(&f, "AgentForOwner", &mut path)? {
        let AgentOwner {
            first_name,
            last_name,
            sig,
            conditions_for_carriage,
        } = &mut p.agent_for_owner;
        person(&agent, first_name, last_name, sig)?;
        agent.text("ConditionsForCarriage", conditions_for_carriage)?;
    }

    Ok(p)
}

/// Builds a draft Transaction from the operation's argument map.
///
/// Only `argument` (the properties object) is read; everything else on the
/// record keeps its zero value for the collaborator to fill in.
pub fn decode_transaction(
    args: &Map<String, Value>,
    argument: &str,
) -> Result<Transaction, DecodeError> {
    let mut tx = Transaction::default();
    match args.get(argument) {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => tx.properties = decode_properties(map)?,
        Some(_) => {
            return Err(DecodeError::WrongKind {
                field: argument.to_string(),
                expected: "object",
            })
        }
    }
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn present_fields_are_transferred_others_stay_zero() {
        let tx = decode_transaction(
            &args(json!({ "Properties": { "Shipper": "ACME", "GrossWeight": 1200 } })),
            "Properties",
        )
        .unwrap();
        assert_eq!(tx.properties.shipper, "ACME");
        assert_eq!(tx.properties.gross_weight, 1200);

        let expected = Properties {
            shipper: "ACME".into(),
            gross_weight: 1200,
            ..Default::default()
        };
        assert_eq!(tx.properties, expected);
        assert!(tx.id.is_empty());
        assert!(tx.signature.is_empty());
    }

    #[test]
    fn nested_parties_are_decoded() {
        let p = decode_properties(&args(json!({
            "IssueDetails": { "PlaceOfIssue": "Sydney" },
            "AgentForOwner": { "LastName": "Doe", "ConditionsForCarriage": "FOB" },
            "MasterInfo": null,
        })))
        .unwrap();
        assert_eq!(p.issue_details.place_of_issue, "Sydney");
        assert_eq!(p.agent_for_owner.last_name, "Doe");
        assert_eq!(p.agent_for_owner.conditions_for_carriage, "FOB");
        assert_eq!(p.master_info, MasterInfo::default());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let p = decode_properties(&args(json!({ "Vessel": "MV X", "Colour": "red" }))).unwrap();
        assert_eq!(p.vessel, "MV X");
    }

    #[test]
    fn missing_properties_yield_empty_draft() {
        let tx = decode_transaction(&Map::new(), "Properties").unwrap();
        assert!(tx.properties.is_empty());
    }

    #[test]
    fn wrong_kind_is_an_error() {
        let err = decode_properties(&args(json!({ "GrossWeight": "heavy" }))).unwrap_err();
        assert_eq!(err.to_string(), "Properties.GrossWeight: expected integer");

        let err = decode_properties(&args(json!({ "IssueDetails": { "DateOfIssue": 5 } })))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Properties.IssueDetails.DateOfIssue: expected string"
        );

        assert!(decode_properties(&args(json!({ "NumBol": 1.5 }))).is_err());
        assert!(decode_transaction(&args(json!({ "Properties": "x" })), "Properties").is_err());
    }
}
