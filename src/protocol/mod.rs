// Wire-level message taxonomy and payload records
//
// The transport hands the engine already-framed envelopes; payloads are JSON documents
// decoded on demand by the handler that claims the message type.

use crate::error::EngineError;
use crate::models::{
    Candle, InstrumentKey, OrderStatus, OrderType, PositionSide, Timeframe, TransferDirection,
};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Numeric message-type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Tick,
    Candle,
    Depth,
    TradePrint,
    Index,
    ReqQryMoney,
    RspQryMoney,
    ReqQryPos,
    RspQryPos,
    ReqSetOrder,
    RspSetOrder,
    ReqQryOrders,
    RspQryOrders,
    ReqCancelOrders,
    RspCancelOrders,
    ReqTransferMoney,
    RspTransferMoney,
}

impl MessageType {
    pub fn tag(self) -> u32 {
        match self {
            MessageType::Tick => 1000,
            MessageType::Candle => 1001,
            MessageType::Depth => 1002,
            MessageType::TradePrint => 1003,
            MessageType::Index => 1004,
            MessageType::ReqQryMoney => 2001,
            MessageType::RspQryMoney => 2002,
            MessageType::ReqQryPos => 2003,
            MessageType::RspQryPos => 2004,
            MessageType::ReqSetOrder => 2005,
            MessageType::RspSetOrder => 2006,
            MessageType::ReqQryOrders => 2007,
            MessageType::RspQryOrders => 2008,
            MessageType::ReqCancelOrders => 2009,
            MessageType::RspCancelOrders => 2010,
            MessageType::ReqTransferMoney => 2011,
            MessageType::RspTransferMoney => 2012,
        }
    }

    /// Unknown tags map to None and are passed through by every handler
    pub fn from_tag(tag: u32) -> Option<Self> {
        let msg_type = match tag {
            1000 => MessageType::Tick,
            1001 => MessageType::Candle,
            1002 => MessageType::Depth,
            1003 => MessageType::TradePrint,
            1004 => MessageType::Index,
            2001 => MessageType::ReqQryMoney,
            2002 => MessageType::RspQryMoney,
            2003 => MessageType::ReqQryPos,
            2004 => MessageType::RspQryPos,
            2005 => MessageType::ReqSetOrder,
            2006 => MessageType::RspSetOrder,
            2007 => MessageType::ReqQryOrders,
            2008 => MessageType::RspQryOrders,
            2009 => MessageType::ReqCancelOrders,
            2010 => MessageType::RspCancelOrders,
            2011 => MessageType::ReqTransferMoney,
            2012 => MessageType::RspTransferMoney,
            _ => return None,
        };
        Some(msg_type)
    }
}

/// One framed message as delivered by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub msg_type: u32,
    pub req_serial: u32,
    pub attribute: u32,
    /// Exchange key of the adapter that published the message
    pub source: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Serialize `payload` into a new envelope
    pub fn encode<T: Serialize>(
        msg_type: MessageType,
        req_serial: u32,
        source: impl Into<String>,
        payload: &T,
    ) -> Result<Self> {
        let bytes = serde_json::to_vec(payload).map_err(|source| EngineError::Encode {
            msg_type: msg_type.tag(),
            source,
        })?;
        Ok(Self {
            msg_type: msg_type.tag(),
            req_serial,
            attribute: 0,
            source: source.into(),
            payload: bytes,
        })
    }

    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_tag(self.msg_type)
    }

    /// Deserialize the payload
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload).map_err(|source| EngineError::Decode {
            msg_type: self.msg_type,
            source,
        })
    }
}

/// Line-oriented JSON form of an envelope, used for replay files and stdout publishing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFrame {
    pub msg_type: u32,
    #[serde(default)]
    pub req_serial: u32,
    #[serde(default)]
    pub attribute: u32,
    #[serde(default)]
    pub source: String,
    pub payload: serde_json::Value,
}

impl JsonFrame {
    pub fn into_envelope(self) -> Result<Envelope> {
        let payload = serde_json::to_vec(&self.payload).map_err(|source| EngineError::Encode {
            msg_type: self.msg_type,
            source,
        })?;
        Ok(Envelope {
            msg_type: self.msg_type,
            req_serial: self.req_serial,
            attribute: self.attribute,
            source: self.source,
            payload,
        })
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        Ok(Self {
            msg_type: envelope.msg_type,
            req_serial: envelope.req_serial,
            attribute: envelope.attribute,
            source: envelope.source.clone(),
            payload: envelope.decode()?,
        })
    }
}

// ============================================================================
// Market data payloads
// ============================================================================

/// One bar update from a venue, possibly for a bar that has not closed yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleMsg {
    #[serde(flatten)]
    pub key: InstrumentKey,
    pub timeframe: Timeframe,
    pub timestamp: u64, // milliseconds
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub amount: f64,
}

impl CandleMsg {
    pub fn to_candle(&self) -> Candle {
        Candle {
            timestamp: (self.timestamp / 1000) as i64,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            amount: self.amount,
        }
    }
}

/// Order book snapshot; accepted but not aggregated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthMsg {
    #[serde(flatten)]
    pub key: InstrumentKey,
    pub timestamp: u64,
    #[serde(default)]
    pub bids: Vec<(f64, f64)>,
    #[serde(default)]
    pub asks: Vec<(f64, f64)>,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReqQryMoney {
    pub exchange: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReqQryPos {
    #[serde(flatten)]
    pub key: InstrumentKey,
}

/// Query a single order by id, or every order in a status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReqQryOrders {
    #[serde(flatten)]
    pub key: InstrumentKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReqTransferMoney {
    pub exchange: String,
    pub symbol: String,
    pub direction: TransferDirection,
    pub amount: f64,
}

// ============================================================================
// Responses
// ============================================================================

/// Business-level outcome embedded in every response; `error_id` 0 means success
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub error_id: i32,
    #[serde(default)]
    pub error_msg: String,
}

impl ApiStatus {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(error_id: i32, error_msg: impl Into<String>) -> Self {
        Self {
            error_id,
            error_msg: error_msg.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_id == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyItem {
    pub symbol: String,
    pub balance: f64,
    pub rights: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RspQryMoney {
    #[serde(default)]
    pub status: ApiStatus,
    #[serde(default)]
    pub items: Vec<MoneyItem>,
}

/// Long and short sides for one contract as reported by the venue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionDetail {
    #[serde(default)]
    pub long: PositionSide,
    #[serde(default)]
    pub short: PositionSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RspQryPos {
    #[serde(default)]
    pub status: ApiStatus,
    pub symbol: String,
    pub contract_type: String,
    #[serde(default)]
    pub positions: Vec<PositionDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RspSetOrder {
    #[serde(default)]
    pub status: ApiStatus,
    pub symbol: String,
    pub contract_type: String,
    #[serde(default)]
    pub order_id: String,
}

/// Order record inside an order-query response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub symbol: String,
    pub contract_type: String,
    pub order_id: String,
    pub amount: f64,
    #[serde(default)]
    pub deal_amount: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub price_avg: f64,
    #[serde(default)]
    pub fee: f64,
    pub status: OrderStatus,
    pub order_type: OrderType,
    #[serde(default)]
    pub unit_amount: f64,
    #[serde(default)]
    pub lever: i32,
    #[serde(default)]
    pub contract_name: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RspQryOrders {
    #[serde(default)]
    pub status: ApiStatus,
    #[serde(default)]
    pub orders: Vec<OrderInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RspCancelOrders {
    #[serde(default)]
    pub status: ApiStatus,
    pub symbol: String,
    pub contract_type: String,
    #[serde(default)]
    pub success: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RspTransferMoney {
    #[serde(default)]
    pub status: ApiStatus,
}
