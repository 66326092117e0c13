//! Tests for error paths and edge cases

use utxo_compiler::compiler::compile;
use utxo_compiler::encoding::{decode_varint, Decodable};
use utxo_compiler::presign::pre_sign;
use utxo_compiler::script::{build, p2pkh_for_public_key, p2wpkh_for_public_key, ScriptTemplate};
use utxo_compiler::sighash::SighashType;
use utxo_compiler::*;

fn simple_transaction(inputs: u8) -> Transaction {
    Transaction::new(
        1,
        (0..inputs).map(|i| TxIn::new(OutPoint::new([i + 1; 32], 0), SEQUENCE_FINAL)).collect(),
        vec![TxOut { value: 1_000, script_pubkey: vec![0x51] }],
        LockTime::ZERO,
    )
    .unwrap()
}

fn raw_signature(claim: OutPoint) -> ClaimSignature {
    ClaimSignature { claim, unlocking: Unlocking::Raw { script_sig: vec![0x51], witness: vec![] } }
}

#[test]
fn test_transaction_construction_errors() {
    let input = TxIn::new(OutPoint::new([1; 32], 0), SEQUENCE_FINAL);
    let output = TxOut { value: 1, script_pubkey: vec![] };

    assert!(matches!(
        Transaction::new(1, vec![], vec![output.clone()], LockTime::ZERO),
        Err(SigningError::EmptyInputs)
    ));
    assert!(matches!(
        Transaction::new(1, vec![input.clone()], vec![], LockTime::ZERO),
        Err(SigningError::EmptyOutputs)
    ));
    assert!(matches!(
        Transaction::new(
            1,
            vec![input.clone()],
            vec![TxOut { value: u64::MAX, script_pubkey: vec![] }, output.clone()],
            LockTime::ZERO
        ),
        Err(SigningError::ValueOverflow)
    ));
    assert!(matches!(
        Transaction::new(1, vec![input.clone(), input], vec![output], LockTime::ZERO),
        Err(SigningError::InvalidParameters(_))
    ));
}

#[test]
fn test_lock_time_threshold_errors() {
    assert!(LockTime::from_height(LOCKTIME_THRESHOLD - 1).is_ok());
    assert!(matches!(
        LockTime::from_height(LOCKTIME_THRESHOLD),
        Err(SigningError::InvalidParameters(_))
    ));
    assert!(LockTime::from_timestamp(LOCKTIME_THRESHOLD).is_ok());
    assert!(matches!(LockTime::from_timestamp(1), Err(SigningError::InvalidParameters(_))));
}

#[test]
fn test_malformed_encodings() {
    // Truncated varint
    assert!(matches!(decode_varint(&[0xfd, 0x01], 0), Err(SigningError::MalformedEncoding(_))));
    // Non-minimal varint
    assert!(matches!(
        decode_varint(&[0xfd, 0x01, 0x00], 0),
        Err(SigningError::MalformedEncoding(_))
    ));
    // Truncated output
    assert!(matches!(TxOut::decode(&[0x01, 0x02]), Err(SigningError::MalformedEncoding(_))));
    // Script length larger than the buffer
    let mut bytes = 5u64.to_le_bytes().to_vec();
    bytes.push(0xfc);
    assert!(matches!(TxOut::decode(&bytes), Err(SigningError::MalformedEncoding(_))));
    // Lock time needs four bytes
    assert!(matches!(
        LockTime::decode(&[0x00, 0x00, 0x00]),
        Err(SigningError::MalformedEncoding(_))
    ));
}

#[test]
fn test_decoding_an_empty_transaction() {
    let mut bytes = 1i32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[0x00, 0x01]); // marker and flag
    bytes.push(0x00); // no inputs
    assert!(Transaction::decode(&bytes).is_err());
}

#[test]
fn test_unknown_sighash_flags() {
    for raw in [0u32, 4, 0x20, 0x7f, 0x0100_0001] {
        assert!(matches!(SighashType::from_u32(raw), Err(SigningError::UnknownSighashFlag(_))));
    }
}

#[test]
fn test_empty_claims() {
    let tx = simple_transaction(1);
    assert!(matches!(pre_sign(&tx, &[]), Err(SigningError::NoClaims)));
    assert!(matches!(UtxoCompiler::new().pre_sign(&tx, &[]), Err(SigningError::NoClaims)));
}

#[test]
fn test_claim_failures_are_wrapped() {
    let tx = simple_transaction(2);
    let key_hash_claim = |seed: u8, script_pubkey: Vec<u8>| {
        TxInClaim::new(OutPoint::new([seed; 32], 0), script_pubkey, None, SIGHASH_ALL)
    };
    let missing_value = key_hash_claim(2, p2wpkh_for_public_key(&[3; 33]));
    let unknown_input = key_hash_claim(7, p2pkh_for_public_key(&[3; 33]));
    let good = key_hash_claim(1, p2pkh_for_public_key(&[3; 33]));

    let err = pre_sign(&tx, &[good.clone(), missing_value]).unwrap_err();
    assert_eq!(err.kind(), "ClaimResolutionFailed");
    match err {
        SigningError::ClaimResolutionFailed { index, source, .. } => {
            assert_eq!(index, 1);
            assert!(matches!(*source, SigningError::MissingValueCommitment(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    match pre_sign(&tx, &[unknown_input, good]).unwrap_err() {
        SigningError::ClaimResolutionFailed { index, source, .. } => {
            assert_eq!(index, 0);
            assert!(matches!(*source, SigningError::UnresolvedClaim(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_two_inputs_one_signature() {
    let tx = simple_transaction(2);
    let signatures = vec![raw_signature(OutPoint::new([1; 32], 0))];
    match compile(&tx, &signatures) {
        Err(SigningError::SignatureCountMismatch { expected, actual }) => {
            assert_eq!(expected, 2);
            assert_eq!(actual, 1);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_signature_for_unknown_claim() {
    let tx = simple_transaction(1);
    let signatures = vec![raw_signature(OutPoint::new([0xaa; 32], 5))];
    assert!(matches!(compile(&tx, &signatures), Err(SigningError::UnresolvedClaim(_))));
}

#[test]
fn test_invalid_signature_bytes() {
    let tx = simple_transaction(1);
    let claim = TxInClaim::new(
        OutPoint::new([1; 32], 0),
        p2pkh_for_public_key(&[2; 33]),
        None,
        SIGHASH_ALL,
    );
    let signatures = vec![ClaimSignature {
        claim: claim.outpoint.clone(),
        unlocking: Unlocking::P2pkh {
            signature: vec![0x30, 0x00, 0x01],
            public_key: vec![0x02; 33],
        },
    }];
    let err = UtxoCompiler::new().compile_verified(&tx, &[claim], &signatures).unwrap_err();
    assert_eq!(err.kind(), "InvalidSignature");

    let empty = vec![ClaimSignature {
        claim: OutPoint::new([1; 32], 0),
        unlocking: Unlocking::P2wpkh { signature: vec![], public_key: vec![0x02; 33] },
    }];
    let claim = TxInClaim::new(
        OutPoint::new([1; 32], 0),
        p2wpkh_for_public_key(&[2; 33]),
        Some(5),
        SIGHASH_ALL,
    );
    assert!(matches!(
        UtxoCompiler::new().compile_verified(&tx, &[claim], &empty),
        Err(SigningError::InvalidSignature(_))
    ));
}

#[test]
fn test_script_template_errors() {
    for template in [
        ScriptTemplate::P2pkh(&[0; 19]),
        ScriptTemplate::P2wsh(&[0; 20]),
        ScriptTemplate::NullData(&[0; 81]),
    ] {
        assert!(matches!(build(template), Err(SigningError::InvalidParameters(_))));
    }

    let keys = vec![vec![0x02; 33], vec![0x03; 33]];
    assert!(matches!(
        build(ScriptTemplate::Multisig { required: 3, public_keys: &keys }),
        Err(SigningError::InvalidParameters(_))
    ));
    assert!(matches!(
        build(ScriptTemplate::Multisig { required: 0, public_keys: &keys }),
        Err(SigningError::InvalidParameters(_))
    ));
}

#[test]
fn test_serialization_errors() {
    let err = protocol::decode_message::<protocol::SigningInput>(b"[1, 2").unwrap_err();
    assert_eq!(err.kind(), "Serialization");
    assert!(matches!(SignerConfig::from_json("not json"), Err(SigningError::Serialization(_))));
}

#[test]
fn test_compile_request_without_claims_is_verified() {
    let tx = simple_transaction(1);
    let request = protocol::PreSerialization {
        version: tx.version(),
        lock_time: tx.lock_time(),
        inputs: tx.inputs().to_vec(),
        outputs: tx.outputs().to_vec(),
        claims: vec![],
        signatures: vec![ClaimSignature {
            claim: tx.inputs()[0].prevout.clone(),
            unlocking: Unlocking::P2pkh { signature: vec![0xde, 0xad], public_key: vec![0x02; 33] },
        }],
    };
    let bytes = protocol::encode_message(&request).unwrap();

    let response: protocol::Response<SerializedTransaction> =
        protocol::decode_message(&protocol::compile_with_signatures(&bytes)).unwrap();
    assert!(response.result.is_none());
    let error = response.into_result().unwrap_err();
    assert_eq!(error.kind, "UnresolvedClaim");

    // Same request through the façade
    let err = UtxoCompiler::new().compile_verified(&tx, &[], &request.signatures).unwrap_err();
    assert!(matches!(err, SigningError::UnresolvedClaim(_)));

    // Opting out of verification compiles the bytes as given
    let config = SignerConfig { verify_signatures: false, ..SignerConfig::default() };
    let trusting = UtxoCompiler::with_config(config).unwrap();
    let response: protocol::Response<SerializedTransaction> =
        protocol::decode_message(&protocol::compile_with_signatures_with(&trusting, &bytes))
            .unwrap();
    assert!(response.into_result().is_ok());
}
