//! Event kind enumeration
//!
//! Producers historically wrote the Chinese log-type label into the event log.
//! Newer producers write a kebab-case wire name. Both parse to the same kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Kind of a domain event appended to the event log
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    IdentityVerified,
    PayrollPaid,
    CompanyFounded,
    FoundingInvested,
    FoundingFailed,
    FoundingSucceeded,
    FoundingEquityGrant,
    FoundingRefund,
    BuyOrderPlaced,
    SellOrderPlaced,
    OrderCancelled,
    OrderFilled,
    StockReleased,
    TradeExecuted,
    ManagerResigned,
    ManagerCandidacy,
    CompanyEdited,
    ProductVoted,
    CandidateSupported,
    ManagerAppointed,
    CompanyProfit,
    DividendPaid,
    CompanyReported,
    ProductReported,
    CompanyRevoked,
    ManagerDisqualified,
    FreeStoneGranted,

    /// A kind this build does not know about; the raw label is preserved
    Unknown(String),
}

/// (kind, wire name, legacy log-type label)
const KIND_TABLE: &[(EventKind, &str, &str)] = &[
    (EventKind::IdentityVerified, "identity-verified", "驗證通過"),
    (EventKind::PayrollPaid, "payroll-paid", "發薪紀錄"),
    (EventKind::CompanyFounded, "company-founded", "創立公司"),
    (EventKind::FoundingInvested, "founding-invested", "參與投資"),
    (EventKind::FoundingFailed, "founding-failed", "創立失敗"),
    (EventKind::FoundingSucceeded, "founding-succeeded", "創立成功"),
    (EventKind::FoundingEquityGrant, "founding-equity-grant", "創立得股"),
    (EventKind::FoundingRefund, "founding-refund", "創立退款"),
    (EventKind::BuyOrderPlaced, "buy-order-placed", "購買下單"),
    (EventKind::SellOrderPlaced, "sell-order-placed", "販賣下單"),
    (EventKind::OrderCancelled, "order-cancelled", "取消下單"),
    (EventKind::OrderFilled, "order-filled", "訂單完成"),
    (EventKind::StockReleased, "stock-released", "公司釋股"),
    (EventKind::TradeExecuted, "trade-executed", "交易紀錄"),
    (EventKind::ManagerResigned, "manager-resigned", "辭職紀錄"),
    (EventKind::ManagerCandidacy, "manager-candidacy", "參選紀錄"),
    (EventKind::CompanyEdited, "company-edited", "經理管理"),
    (EventKind::ProductVoted, "product-voted", "推薦產品"),
    (EventKind::CandidateSupported, "candidate-supported", "支持紀錄"),
    (EventKind::ManagerAppointed, "manager-appointed", "就任經理"),
    (EventKind::CompanyProfit, "company-profit", "公司營利"),
    (EventKind::DividendPaid, "dividend-paid", "營利分紅"),
    (EventKind::CompanyReported, "company-reported", "舉報公司"),
    (EventKind::ProductReported, "product-reported", "舉報產品"),
    (EventKind::CompanyRevoked, "company-revoked", "公司撤銷"),
    (EventKind::ManagerDisqualified, "manager-disqualified", "取消資格"),
    (EventKind::FreeStoneGranted, "free-stone-granted", "免費得石"),
];

impl EventKind {
    /// Parse a wire name or legacy label. Never fails: unrecognized labels
    /// become [`EventKind::Unknown`].
    pub fn parse(label: &str) -> Self {
        KIND_TABLE
            .iter()
            .find(|(_, wire, legacy)| *wire == label || *legacy == label)
            .map(|(kind, _, _)| kind.clone())
            .unwrap_or_else(|| Self::Unknown(label.to_string()))
    }

    /// Canonical wire name (raw label for unknown kinds)
    pub fn as_str(&self) -> &str {
        if let Self::Unknown(raw) = self {
            return raw;
        }
        KIND_TABLE
            .iter()
            .find(|(kind, _, _)| kind == self)
            .map(|(_, wire, _)| *wire)
            .unwrap_or_default()
    }

    /// Legacy log-type label, if this kind has one
    pub fn legacy_label(&self) -> Option<&'static str> {
        KIND_TABLE
            .iter()
            .find(|(kind, _, _)| kind == self)
            .map(|(_, _, legacy)| *legacy)
    }

    /// Kinds that are resolved without ever producing a notification
    pub fn is_excluded(&self) -> bool {
        matches!(
            self,
            Self::IdentityVerified | Self::CandidateSupported | Self::FreeStoneGranted
        )
    }

    /// Kinds whose notification is only visible to the users named in the payload
    pub fn is_targeted(&self) -> bool {
        matches!(
            self,
            Self::FoundingEquityGrant | Self::FoundingRefund | Self::OrderFilled | Self::DividendPaid
        )
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::parse(&label))
    }
}
