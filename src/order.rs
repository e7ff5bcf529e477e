//! Record payload decoding
//!
//! Payloads are UTF-8 JSON documents. [`JsonRecordProcessor`] decodes each
//! one into a `serde` type and logs it; [`OrderProcessor`] is the variant
//! used by the binary.

use crate::client::FetchedRecord;
use crate::error::{DecodeError, ProcessingError};
use crate::processor::RecordProcessor;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use tracing::info;

/// An order event as produced onto the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub seller_id: String,
    pub product_code: String,
    pub product_name: String,
    pub product_price: f64,
    pub product_quantity: u32,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order{{orderId={}, customerId={}, sellerId={}, productCode={}, productName={}, productPrice={}, productQuantity={}}}",
            self.order_id,
            self.customer_id,
            self.seller_id,
            self.product_code,
            self.product_name,
            self.product_price,
            self.product_quantity
        )
    }
}

/// Decode a UTF-8 JSON payload into `T`
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    Ok(serde_json::from_str(text)?)
}

/// Decodes every record into `T` and logs the result
pub struct JsonRecordProcessor<T> {
    _payload: PhantomData<fn() -> T>,
}

impl<T> JsonRecordProcessor<T> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<T> Default for JsonRecordProcessor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonRecordProcessor<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> RecordProcessor for JsonRecordProcessor<T>
where
    T: DeserializeOwned + fmt::Display + Send + 'static,
{
    async fn process_record(
        &self,
        shard_id: &str,
        record: &FetchedRecord,
    ) -> Result<(), ProcessingError> {
        let value: T = decode_payload(&record.payload)?;
        info!(
            shard_id = %shard_id,
            sequence = %record.sequence_number,
            "Read {} from shard {} at position {}",
            value,
            shard_id,
            record.sequence_number
        );
        Ok(())
    }
}

pub type OrderProcessor = JsonRecordProcessor<Order>;
