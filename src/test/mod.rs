//! Test utilities and mock implementations for testing the consumer

pub mod mocks;

use crate::client::FetchedRecord;
use crate::order::Order;
use bytes::Bytes;
use chrono::Utc;

/// Helper functions for creating test data
pub struct TestUtils;

impl TestUtils {
    /// Create a test record with given sequence number and data
    pub fn create_test_record(sequence_number: &str, data: &[u8]) -> FetchedRecord {
        FetchedRecord {
            sequence_number: sequence_number.to_string(),
            partition_key: "test-partition-key".to_string(),
            payload: Bytes::copy_from_slice(data),
            approximate_arrival: Some(Utc::now()),
        }
    }

    /// Create a vector of test records carrying order payloads
    pub fn create_test_records(count: usize) -> Vec<FetchedRecord> {
        (0..count)
            .map(|i| {
                Self::create_order_record(
                    &format!("sequence-{}", i),
                    &Self::create_test_order(&format!("order-{}", i), 1),
                )
            })
            .collect()
    }

    pub fn create_test_order(order_id: &str, quantity: u32) -> Order {
        Order {
            order_id: order_id.to_string(),
            customer_id: "c-17".to_string(),
            seller_id: "s-2".to_string(),
            product_code: "P-100".to_string(),
            product_name: "Widget".to_string(),
            product_price: 19.99,
            product_quantity: quantity,
        }
    }

    pub fn order_payload(order: &Order) -> Vec<u8> {
        serde_json::to_vec(order).expect("Order always serializes")
    }

    pub fn create_order_record(sequence_number: &str, order: &Order) -> FetchedRecord {
        Self::create_test_record(sequence_number, &Self::order_payload(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::decode_payload;

    #[test]
    fn test_create_test_record() {
        let record = TestUtils::create_test_record("seq-1", b"test-data");
        assert_eq!(record.sequence_number, "seq-1");
        assert_eq!(record.payload.as_ref(), b"test-data");
        assert_eq!(record.partition_key, "test-partition-key");
    }

    #[test]
    fn test_create_test_records() {
        let records = TestUtils::create_test_records(3);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].sequence_number, "sequence-0");
        assert_eq!(records[2].sequence_number, "sequence-2");

        let order: Order = decode_payload(&records[1].payload).unwrap();
        assert_eq!(order.order_id, "order-1");
    }
}
