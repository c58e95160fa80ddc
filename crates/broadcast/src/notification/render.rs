//! Event → notification rendering
//!
//! Rendering is a pure function of the event: no I/O, no clock, no store.
//! Every kind maps to exactly one outcome, and kinds this build does not
//! recognize degrade to [`RenderOutcome::Unrecognized`].

use serde::{Deserialize, Serialize};

use super::record::{NotificationRecord, Visibility};
use crate::event::{EventFields, EventKind, EventRecord, MissingField};

/// Placeholder written by producers when a company had no previous manager
pub const NO_MANAGER: &str = "!none";

/// Why an event was resolved without a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "field", rename_all = "snake_case")]
pub enum SuppressReason {
    /// The kind never produces notifications
    Excluded,

    /// The payload lacked a field its kind requires
    MalformedPayload(MissingField),
}

/// Result of rendering one event
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Produce(NotificationRecord),
    Suppress(SuppressReason),
    /// Unknown kind; carries the raw label
    Unrecognized(String),
}

impl RenderOutcome {
    pub fn notification(&self) -> Option<&NotificationRecord> {
        match self {
            Self::Produce(record) => Some(record),
            _ => None,
        }
    }
}

/// Render an event into its notification outcome
pub fn render(event: &EventRecord) -> RenderOutcome {
    if let EventKind::Unknown(raw) = &event.kind {
        return RenderOutcome::Unrecognized(raw.clone());
    }

    match compose(&event.kind, &event.fields) {
        Ok(Some(message)) => match visibility(&event.kind, &event.fields) {
            Ok(visibility) => RenderOutcome::Produce(NotificationRecord::from_event(
                event, message, visibility,
            )),
            Err(field) => RenderOutcome::Suppress(SuppressReason::MalformedPayload(field)),
        },
        Ok(None) => RenderOutcome::Suppress(SuppressReason::Excluded),
        Err(field) => RenderOutcome::Suppress(SuppressReason::MalformedPayload(field)),
    }
}

fn visibility(kind: &EventKind, fields: &EventFields) -> Result<Visibility, MissingField> {
    if kind.is_targeted() {
        Ok(Visibility::Restricted(fields.all_users()?.to_vec()))
    } else {
        Ok(Visibility::Broadcast)
    }
}

/// Build the message text, or `None` for kinds that never notify
fn compose(kind: &EventKind, f: &EventFields) -> Result<Option<String>, MissingField> {
    use EventKind::*;

    let message = match kind {
        IdentityVerified | CandidateSupported | FreeStoneGranted | Unknown(_) => return Ok(None),
        PayrollPaid => format!("系統向所有已驗證通過的使用者發給了{}的薪水！", f.price()?),
        CompanyFounded => format!(
            "{}發起了「{}」的新公司創立計劃，誠意邀請有意者投資！",
            f.user(0)?,
            f.company()?
        ),
        FoundingInvested => format!(
            "{}向「{}公司創立計劃」投資了${}！",
            f.user(0)?,
            f.company()?,
            f.amount()?
        ),
        FoundingFailed => format!(
            "{}等人投資的「{}公司創立計劃」由於投資人數不足失敗了，投資金額將全數返回！",
            f.all_users()?.join("、"),
            f.company()?
        ),
        FoundingSucceeded => format!(
            "{}等人投資的「{}公司創立計劃」成功了，該公司正式上市，初始股價為${}！",
            f.all_users()?.join("、"),
            f.company()?,
            f.price()?
        ),
        FoundingEquityGrant => format!(
            "對「{}公司創立計劃」的投資為你帶來了{}數量的公司股票！",
            f.company()?,
            f.amount()?
        ),
        FoundingRefund => format!(
            "從「{}公司創立計劃」收回了${}的投資退款！",
            f.company()?,
            f.amount()?
        ),
        BuyOrderPlaced | SellOrderPlaced => format!(
            "{}想要用每股${}的單價{}{}數量的「{}」公司股票！",
            f.user(0)?,
            f.price()?,
            if *kind == BuyOrderPlaced { "購買" } else { "販賣" },
            f.amount()?,
            f.company()?
        ),
        OrderCancelled => format!(
            "{}取消了以每股${}的單價{}{}數量的「{}」公司股票的訂單！",
            f.user(0)?,
            f.price()?,
            f.text()?,
            f.amount()?,
            f.company()?
        ),
        OrderFilled => format!(
            "您以每股${}的單價{}{}數量的「{}」公司股票的訂單已經全數交易完畢！",
            f.price()?,
            f.text()?,
            f.amount()?,
            f.company()?
        ),
        StockReleased => format!(
            "由於股價持續高漲，「{}」公司以${}的價格釋出了{}數量的股票到市場上以套取利潤！",
            f.company()?,
            f.price()?,
            f.amount()?
        ),
        TradeExecuted => {
            let company = f.company()?;
            // Without a named seller the company itself sold the shares
            let seller = match f.user(1) {
                Ok(seller) if !seller.is_empty() => seller.to_string(),
                _ => format!("「{company}」公司"),
            };
            format!(
                "{}以${}的單價向{}購買了{}數量的「{}」公司股票！",
                f.user(0)?,
                f.price()?,
                seller,
                f.amount()?,
                company
            )
        }
        ManagerResigned => format!("{}辭去了「{}」公司的經理人職務！", f.user(0)?, f.company()?),
        ManagerCandidacy => format!(
            "{}開始競選「{}」公司的經理人職務！",
            f.user(0)?,
            f.company()?
        ),
        CompanyEdited => format!("{}修改了「{}」公司的資訊！", f.user(0)?, f.company()?),
        ProductVoted => format!(
            "{}向「{}」公司的一項產品投了一張推薦票，使其獲得了${}的營利額！",
            f.user(0)?,
            f.company()?,
            f.price()?
        ),
        ManagerAppointed => manager_appointed(f)?,
        CompanyProfit => format!(
            "「{}」公司在本商業季度一共獲利${}！",
            f.company()?,
            f.amount()?
        ),
        DividendPaid => format!("你得到了「{}」公司的分紅${}！", f.company()?, f.amount()?),
        CompanyReported => format!(
            "{}以「{}」理由舉報了「{}」公司！",
            f.user(0)?,
            f.text()?,
            f.company()?
        ),
        ProductReported => format!(
            "{}以「{}」理由舉報了「{}」公司的#{}產品！",
            f.user(0)?,
            f.text()?,
            f.company()?,
            f.product()?
        ),
        CompanyRevoked => format!(
            "{}以「{}」理由撤銷了「{}」公司！",
            f.user(0)?,
            f.text()?,
            f.company()?
        ),
        ManagerDisqualified => format!(
            "{}以「{}」理由取消了{}擔任經理人的資格！",
            f.user(0)?,
            f.text()?,
            f.user(1)?
        ),
    };

    Ok(Some(message))
}

/// `users[0]` is the new manager, `users[1]` the previous one
fn manager_appointed(f: &EventFields) -> Result<String, MissingField> {
    let manager = f.user(0)?;
    let previous = f.user(1)?;

    let outcome = if previous == NO_MANAGER {
        "成為了公司的經理人。".to_string()
    } else if previous == manager {
        format!("繼續擔任「{}」公司的經理人職務。", f.company()?)
    } else {
        format!("取代了{}成為了「{}」公司的經理人。", previous, f.company()?)
    };

    let support = match f.amount {
        Some(amount) if amount != 0 => format!("以{amount}數量的支持股份"),
        _ => String::new(),
    };

    Ok(format!(
        "{}在{}商業季度{}擊敗了所有競爭對手，{}",
        manager,
        f.text()?,
        support,
        outcome
    ))
}
