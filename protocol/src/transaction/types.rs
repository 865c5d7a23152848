//! Freight document types carried by every BFTX transaction.
//!
//! `Properties` is the bill-of-lading payload. Wire names are PascalCase so
//! the JSON form matches the field names clients select through the
//! gateway. All fields default to their zero value; a partially filled bill
//! is a valid bill.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Nested parties
// ---------------------------------------------------------------------------

/// Where and when the bill of lading was issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IssueDetails {
    pub place_of_issue: String,
    pub date_of_issue: String,
}

/// The vessel master.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MasterInfo {
    pub first_name: String,
    pub last_name: String,
    pub sig: String,
}

/// Agent signing on behalf of the master.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentMaster {
    pub first_name: String,
    pub last_name: String,
    pub sig: String,
}

/// Agent signing on behalf of the owner, with the carriage conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentOwner {
    pub first_name: String,
    pub last_name: String,
    pub sig: String,
    pub conditions_for_carriage: String,
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Bill-of-lading fields of a freight transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Properties {
    pub shipper: String,
    pub bol_num: String,
    pub ref_num: String,
    pub consignee: String,
    pub house_bill: String,
    pub vessel: String,
    pub port_loading: String,
    pub port_discharge: String,
    pub notify_address: String,
    pub desc_of_goods: String,
    /// Gross weight in kilograms.
    pub gross_weight: i64,
    /// Freight payable amount, in cents.
    pub freight_payable_amt: i64,
    /// Freight advance amount, in cents.
    pub freight_adv_amt: i64,
    pub general_instructions: String,
    pub date_shipped: String,
    pub issue_details: IssueDetails,
    /// Number of original bills issued.
    pub num_bol: i64,
    pub master_info: MasterInfo,
    pub agent_for_master: AgentMaster,
    pub agent_for_owner: AgentOwner,
}

impl Properties {
    /// Appends the canonical byte form used for transaction IDs and
    /// signatures: each text field followed by a null byte, each integer as
    /// 8 little-endian bytes, in declaration order.
    ///
    /// serde formats are avoided here so the byte layout can never drift
    /// with a serializer upgrade.
    pub fn write_canonical(&self, buf: &mut Vec<u8>) {
        for text in [
            &self.shipper,
            &self.bol_num,
            &self.ref_num,
            &self.consignee,
            &self.house_bill,
            &self.vessel,
            &self.port_loading,
            &self.port_discharge,
            &self.notify_address,
            &self.desc_of_goods,
        ] {
            push_text(buf, text);
        }
        buf.extend_from_slice(&self.gross_weight.to_le_bytes());
        buf.extend_from_slice(&self.freight_payable_amt.to_le_bytes());
        buf.extend_from_slice(&self.freight_adv_amt.to_le_bytes());
        push_text(buf, &self.general_instructions);
        push_text(buf, &self.date_shipped);
        push_text(buf, &self.issue_details.place_of_issue);
        push_text(buf, &self.issue_details.date_of_issue);
        buf.extend_from_slice(&self.num_bol.to_le_bytes());
        for text in [
            &self.master_info.first_name,
            &self.master_info.last_name,
            &self.master_info.sig,
            &self.agent_for_master.first_name,
            &self.agent_for_master.last_name,
            &self.agent_for_master.sig,
            &self.agent_for_owner.first_name,
            &self.agent_for_owner.last_name,
            &self.agent_for_owner.sig,
            &self.agent_for_owner.conditions_for_carriage,
        ] {
            push_text(buf, text);
        }
    }

    /// Returns `true` when every field holds its zero value.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Null-terminated text field.
pub(crate) fn push_text(buf: &mut Vec<u8>, text: &str) {
    buf.extend_from_slice(text.as_bytes());
    buf.push(0x00);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_properties_are_empty() {
        assert!(Properties::default().is_empty());
        let filled = Properties {
            shipper: "ACME".into(),
            ..Default::default()
        };
        assert!(!filled.is_empty());
    }

    #[test]
    fn canonical_bytes_distinguish_shifted_fields() {
        // "AB" + "" must not collide with "A" + "B".
        let a = Properties {
            shipper: "AB".into(),
            ..Default::default()
        };
        let b = Properties {
            shipper: "A".into(),
            bol_num: "B".into(),
            ..Default::default()
        };
        let (mut buf_a, mut buf_b) = (Vec::new(), Vec::new());
        a.write_canonical(&mut buf_a);
        b.write_canonical(&mut buf_b);
        assert_ne!(buf_a, buf_b);
    }

    #[test]
    fn wire_names_are_pascal_case() {
        let props = Properties {
            bol_num: "BOL-1".into(),
            issue_details: IssueDetails {
                place_of_issue: "Rotterdam".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(json["BolNum"], "BOL-1");
        assert_eq!(json["IssueDetails"]["PlaceOfIssue"], "Rotterdam");
        assert_eq!(json["AgentForOwner"]["ConditionsForCarriage"], "");
    }
}
