use crate::domain::money::Points;
use crate::domain::order::OrderStatus;
use serde::Deserialize;

/// Status values the accrual service reports.
///
/// `REGISTERED` means the service accepted the order but has not started on
/// it; the ledger treats it as NEW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteStatus {
    Registered,
    New,
    Processing,
    Invalid,
    Processed,
}

impl From<RemoteStatus> for OrderStatus {
    fn from(status: RemoteStatus) -> Self {
        match status {
            RemoteStatus::Registered | RemoteStatus::New => OrderStatus::New,
            RemoteStatus::Processing => OrderStatus::Processing,
            RemoteStatus::Invalid => OrderStatus::Invalid,
            RemoteStatus::Processed => OrderStatus::Processed,
        }
    }
}

/// Body of `GET /api/orders/{number}` on a 200 response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccrualBody {
    pub order: String,
    pub status: RemoteStatus,
    #[serde(default)]
    pub accrual: Option<Points>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_body() {
        let body: AccrualBody =
            serde_json::from_str(r#"{"order":"9359943520","status":"PROCESSED","accrual":729.98}"#)
                .unwrap();
        assert_eq!(body.order, "9359943520");
        assert_eq!(OrderStatus::from(body.status), OrderStatus::Processed);
        assert_eq!(body.accrual, Some(Points::from_minor(72998)));
    }

    #[test]
    fn test_accrual_is_optional() {
        let body: AccrualBody =
            serde_json::from_str(r#"{"order":"9359943520","status":"REGISTERED"}"#).unwrap();
        assert_eq!(OrderStatus::from(body.status), OrderStatus::New);
        assert_eq!(body.accrual, None);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result = serde_json::from_str::<AccrualBody>(r#"{"order":"1","status":"LOST"}"#);
        assert!(result.is_err());
    }
}
