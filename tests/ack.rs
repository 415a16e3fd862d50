use binary_util::interfaces::{Reader, Writer};

use rak_core::protocol::ack::{AckSet, Record, ID_ACK, ID_NACK, MAX_RANGE_SPAN};

fn encode(set: &AckSet) -> Vec<u8> {
    set.write_to_bytes().unwrap().as_slice().to_vec()
}

#[test]
fn control_ids() {
    assert_eq!(ID_ACK, 0xc0);
    assert_eq!(ID_NACK, 0xa0);
}

#[test]
fn packs_runs_and_singletons() {
    let set = AckSet::from_keys(vec![1, 2, 3, 5, 9, 10]);
    assert_eq!(
        set.records,
        vec![Record::Range(1, 3), Record::Single(5), Record::Range(9, 10)]
    );

    assert_eq!(
        encode(&set),
        vec![
            0x00, 0x03, // record count
            0x00, 0x01, 0x00, 0x00, 0x03, 0x00, 0x00, // 1..=3
            0x01, 0x05, 0x00, 0x00, // 5
            0x00, 0x09, 0x00, 0x00, 0x0a, 0x00, 0x00, // 9..=10
        ]
    );
}

#[test]
fn unsorted_input_is_sorted_first() {
    let set = AckSet::from_keys(vec![10, 1, 9, 3, 2, 5]);
    assert_eq!(
        set.records,
        vec![Record::Range(1, 3), Record::Single(5), Record::Range(9, 10)]
    );
}

#[test]
fn duplicates_are_flattened() {
    let set = AckSet::from_keys(vec![4, 4, 5]);
    assert_eq!(set.records, vec![Record::Range(4, 5)]);
}

#[test]
fn empty_set_encodes_zero_records() {
    let set = AckSet::from_keys(Vec::new());
    assert!(set.is_empty());
    assert_eq!(encode(&set), vec![0x00, 0x00]);

    let decoded = AckSet::read_from_slice(&[0x00, 0x00]).unwrap();
    assert!(decoded.keys().is_empty());
}

#[test]
fn roundtrip_preserves_the_key_set() {
    let keys = vec![0, 1, 2, 7, 11, 12, 13, 14, 100, 200, 201];
    let set = AckSet::from_keys(keys.clone());
    let decoded = AckSet::read_from_slice(&encode(&set)).unwrap();
    assert_eq!(decoded.keys(), keys);
}

#[test]
fn decode_caps_hostile_ranges() {
    // a single record claiming 100_000 keys
    let bytes = [
        0x00, 0x01, // one record
        0x00, // range tag
        0x00, 0x00, 0x00, // start 0
        0xa0, 0x86, 0x01, // end 100_000
    ];
    let decoded = AckSet::read_from_slice(&bytes).unwrap();
    assert_eq!(decoded.keys().len(), MAX_RANGE_SPAN as usize + 1);
}

#[test]
fn decode_fixes_inverted_ranges() {
    let bytes = [
        0x00, 0x01, // one record
        0x00, // range tag
        0x05, 0x00, 0x00, // "start" 5
        0x02, 0x00, 0x00, // "end" 2
    ];
    let decoded = AckSet::read_from_slice(&bytes).unwrap();
    assert_eq!(decoded.keys(), vec![2, 3, 4, 5]);
}

#[test]
fn decode_rejects_unknown_tags() {
    let bytes = [0x00, 0x01, 0x07, 0x00, 0x00, 0x00];
    assert!(AckSet::read_from_slice(&bytes).is_err());
}
