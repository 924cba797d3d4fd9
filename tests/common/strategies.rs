use proptest::prelude::*;

use wordlist_core::status::SourceStatus;

/// Strategy for generating lowercase words
pub fn word_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,12}"
}

/// Strategy for generating pending payload sets, including empty ones
pub fn word_list_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(word_strategy(), 0..=120)
}

pub fn status_strategy() -> impl Strategy<Value = SourceStatus> {
    prop::sample::select(SourceStatus::ALL.to_vec())
}

/// Strategy for generating out-of-order status signals
pub fn status_sequence_strategy() -> impl Strategy<Value = Vec<SourceStatus>> {
    prop::collection::vec(status_strategy(), 1..20)
}

/// Strategy for generating processed-word deltas
pub fn word_delta_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..40, 1..12)
}
