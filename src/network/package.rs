use crate::core::{Amount, BlockRecord, PublicKey, Transaction};
use serde::{Deserialize, Serialize};

/// Requests a node answers. One package per connection, answered by one `Response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Package {
    SubmitBlock {
        addr_from: String,
        block: BlockRecord,
    },
    SubmitTransaction {
        addr_from: String,
        transaction: Transaction,
    },
    GetBlockCount,
    /// Balance of `pub_key`, or of the node's own key when absent
    GetBalance {
        pub_key: Option<PublicKey>,
    },
    StartMining,
    StopMining,
    StartGenerator {
        interval_secs: Option<u64>,
    },
    StopGenerator,
    VerifyBlockchain,
    /// Have the node's wallet pay `amount` to `to`
    Send {
        to: PublicKey,
        amount: Amount,
        fee: Option<Amount>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Count {
        count: usize,
    },
    Balance {
        current_balance: Amount,
    },
    Verified {
        verified: bool,
    },
    Submitted {
        id: String,
    },
    Ack {
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Status {
        message: String,
    },
}

impl Response {
    pub fn accepted() -> Response {
        Response::Ack {
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Response {
        Response::Ack {
            accepted: false,
            reason: Some(reason.into()),
        }
    }

    pub fn status(message: impl Into<String>) -> Response {
        Response::Status {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_responses_match_wire_shape() {
        let count = serde_json::to_value(Response::Count { count: 3 }).unwrap();
        assert_eq!(count, serde_json::json!({"count": 3}));

        let balance = Response::Balance {
            current_balance: Amount::from_millis(60_500),
        };
        assert_eq!(
            serde_json::to_value(&balance).unwrap(),
            serde_json::json!({"current_balance": 60.5})
        );
    }

    #[test]
    fn test_untagged_responses_parse_back() {
        let parsed: Response = serde_json::from_str(r#"{"accepted": false, "reason": "bad"}"#).unwrap();
        assert_eq!(parsed, Response::rejected("bad"));
        let parsed: Response = serde_json::from_str(r#"{"verified": true}"#).unwrap();
        assert_eq!(parsed, Response::Verified { verified: true });
        let parsed: Response = serde_json::from_str(r#"{"accepted": true}"#).unwrap();
        assert_eq!(parsed, Response::accepted());
    }

    #[test]
    fn test_package_is_externally_tagged() {
        let json = serde_json::to_value(Package::GetBalance { pub_key: None }).unwrap();
        assert_eq!(json, serde_json::json!({"GetBalance": {"pub_key": null}}));
        let unit = serde_json::to_value(Package::StartMining).unwrap();
        assert_eq!(unit, serde_json::json!("StartMining"));
    }
}
