//! Locking and unlocking script construction and classification

use crate::constants::*;
use crate::error::{Result, SigningError};
use crate::hashes::{hash160, sha256};
use crate::types::ByteString;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CODESEPARATOR: u8 = 0xab;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Recognized locking script shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptKind {
    P2pkh([u8; 20]),
    P2sh([u8; 20]),
    P2wpkh([u8; 20]),
    P2wsh([u8; 32]),
    /// OP_RETURN followed by pushes only
    NullData,
    /// Bare `m <keys> n OP_CHECKMULTISIG`
    Multisig { required: u8, keys: u8 },
    NonStandard,
}

impl ScriptKind {
    pub fn is_witness_program(&self) -> bool {
        matches!(self, ScriptKind::P2wpkh(_) | ScriptKind::P2wsh(_))
    }
}

/// Parameters for building a standard locking script.
#[derive(Debug, Clone, Copy)]
pub enum ScriptTemplate<'a> {
    /// 20-byte public key hash
    P2pkh(&'a [u8]),
    /// 20-byte script hash
    P2sh(&'a [u8]),
    /// 20-byte public key hash
    P2wpkh(&'a [u8]),
    /// 32-byte witness script hash
    P2wsh(&'a [u8]),
    /// OP_RETURN payload
    NullData(&'a [u8]),
    Multisig { required: usize, public_keys: &'a [ByteString] },
}

/// Builds the locking script for `template`.
pub fn build(template: ScriptTemplate<'_>) -> Result<ByteString> {
    match template {
        ScriptTemplate::P2pkh(hash) => {
            expect_len("P2PKH public key hash", hash, 20)?;
            let mut script = vec![OP_DUP, OP_HASH160, 0x14];
            script.extend_from_slice(hash);
            script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
            Ok(script)
        }
        ScriptTemplate::P2sh(hash) => {
            expect_len("P2SH script hash", hash, 20)?;
            let mut script = vec![OP_HASH160, 0x14];
            script.extend_from_slice(hash);
            script.push(OP_EQUAL);
            Ok(script)
        }
        ScriptTemplate::P2wpkh(hash) => {
            expect_len("P2WPKH public key hash", hash, 20)?;
            let mut script = vec![OP_0, 0x14];
            script.extend_from_slice(hash);
            Ok(script)
        }
        ScriptTemplate::P2wsh(hash) => {
            expect_len("P2WSH script hash", hash, 32)?;
            let mut script = vec![OP_0, 0x20];
            script.extend_from_slice(hash);
            Ok(script)
        }
        ScriptTemplate::NullData(data) => {
            if data.len() > MAX_NULL_DATA_SIZE {
                return Err(SigningError::InvalidParameters(format!(
                    "OP_RETURN payload of {} bytes exceeds {}",
                    data.len(),
                    MAX_NULL_DATA_SIZE
                )));
            }
            let mut script = vec![OP_RETURN];
            push_data(data, &mut script);
            Ok(script)
        }
        ScriptTemplate::Multisig { required, public_keys } => {
            if public_keys.is_empty() || public_keys.len() > MAX_MULTISIG_KEYS {
                return Err(SigningError::InvalidParameters(format!(
                    "multisig needs 1..={} keys, got {}",
                    MAX_MULTISIG_KEYS,
                    public_keys.len()
                )));
            }
            if required == 0 || required > public_keys.len() {
                return Err(SigningError::InvalidParameters(format!(
                    "multisig threshold {} of {} keys",
                    required,
                    public_keys.len()
                )));
            }
            let mut script = vec![small_int_opcode(required as u8)];
            for key in public_keys {
                if key.len() != 33 && key.len() != 65 {
                    return Err(SigningError::InvalidParameters(format!(
                        "public key must be 33 or 65 bytes, got {}",
                        key.len()
                    )));
                }
                push_data(key, &mut script);
            }
            script.push(small_int_opcode(public_keys.len() as u8));
            script.push(OP_CHECKMULTISIG);
            Ok(script)
        }
    }
}

fn expect_len(what: &str, bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(SigningError::InvalidParameters(format!(
            "{} must be {} bytes, got {}",
            what,
            expected,
            bytes.len()
        )));
    }
    Ok(())
}

fn small_int_opcode(n: u8) -> u8 {
    if n == 0 {
        OP_0
    } else {
        OP_1 + n - 1
    }
}

fn decode_small_int(opcode: u8) -> Option<u8> {
    match opcode {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some(opcode - OP_1 + 1),
        _ => None,
    }
}

/// P2PKH locking script paying to the HASH160 of `public_key`.
pub fn p2pkh_for_public_key(public_key: &[u8]) -> ByteString {
    let hash = hash160(public_key);
    let mut script = vec![OP_DUP, OP_HASH160, 0x14];
    script.extend_from_slice(&hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// P2WPKH program for `public_key`.
pub fn p2wpkh_for_public_key(public_key: &[u8]) -> ByteString {
    let mut script = vec![OP_0, 0x14];
    script.extend_from_slice(&hash160(public_key));
    script
}

/// P2SH locking script for `redeem_script`.
pub fn p2sh_for_script(redeem_script: &[u8]) -> ByteString {
    let mut script = vec![OP_HASH160, 0x14];
    script.extend_from_slice(&hash160(redeem_script));
    script.push(OP_EQUAL);
    script
}

/// P2WSH program for `witness_script`.
pub fn p2wsh_for_script(witness_script: &[u8]) -> ByteString {
    let mut script = vec![OP_0, 0x20];
    script.extend_from_slice(&sha256(witness_script));
    script
}

/// Appends the minimal push of `data`.
pub fn push_data(data: &[u8], script: &mut ByteString) {
    let len = data.len();
    if len == 0 {
        script.push(OP_0);
        return;
    } else if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// Classifies `script` by exact template match.
pub fn classify(script: &[u8]) -> ScriptKind {
    match script {
        [OP_DUP, OP_HASH160, 0x14, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
            ScriptKind::P2pkh(to_array(hash))
        }
        [OP_HASH160, 0x14, hash @ .., OP_EQUAL] if hash.len() == 20 => {
            ScriptKind::P2sh(to_array(hash))
        }
        [OP_0, 0x14, hash @ ..] if hash.len() == 20 => ScriptKind::P2wpkh(to_array(hash)),
        [OP_0, 0x20, hash @ ..] if hash.len() == 32 => ScriptKind::P2wsh(to_array(hash)),
        [OP_RETURN, rest @ ..] if is_push_only(rest) => ScriptKind::NullData,
        _ => classify_multisig(script).unwrap_or(ScriptKind::NonStandard),
    }
}

fn to_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn classify_multisig(script: &[u8]) -> Option<ScriptKind> {
    let ops = instructions(script).collect::<Result<Vec<_>>>().ok()?;
    let (first, rest) = ops.split_first()?;
    let (last, rest) = rest.split_last()?;
    let (count, keys) = rest.split_last()?;

    if *last != Instruction::Op(OP_CHECKMULTISIG) {
        return None;
    }
    let required = match first {
        Instruction::Op(op) => decode_small_int(*op)?,
        _ => return None,
    };
    let total = match count {
        Instruction::Op(op) => decode_small_int(*op)?,
        _ => return None,
    };
    let keys_ok = keys
        .iter()
        .all(|k| matches!(k, Instruction::Push(data) if data.len() == 33 || data.len() == 65));
    if !keys_ok || keys.len() != total as usize || required == 0 || required > total {
        return None;
    }
    Some(ScriptKind::Multisig { required, keys: total })
}

fn is_push_only(script: &[u8]) -> bool {
    instructions(script).all(|op| match op {
        Ok(Instruction::Push(_)) => true,
        Ok(Instruction::Op(op)) => op == OP_1NEGATE || (OP_1..=OP_16).contains(&op),
        Err(_) => false,
    })
}

/// Parsed script element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Data push, including `OP_0` as an empty push
    Push(&'a [u8]),
    Op(u8),
}

/// Iterator over the instructions of a script.
pub struct Instructions<'a> {
    script: &'a [u8],
    position: usize,
    failed: bool,
}

pub fn instructions(script: &[u8]) -> Instructions<'_> {
    Instructions { script, position: 0, failed: false }
}

impl<'a> Instructions<'a> {
    /// Byte offset of the next instruction.
    pub fn position(&self) -> usize {
        self.position
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.position.checked_add(len).filter(|end| *end <= self.script.len());
        match end {
            Some(end) => {
                let data = &self.script[self.position..end];
                self.position = end;
                Ok(data)
            }
            None => Err(SigningError::MalformedEncoding(format!(
                "push of {} bytes at offset {} runs past end of script",
                len, self.position
            ))),
        }
    }

    fn next_instruction(&mut self) -> Result<Instruction<'a>> {
        let opcode = self.take(1)?[0];
        let len = match opcode {
            OP_0 => return Ok(Instruction::Push(&[])),
            0x01..=0x4b => opcode as usize,
            OP_PUSHDATA1 => self.take(1)?[0] as usize,
            OP_PUSHDATA2 => {
                let raw = self.take(2)?;
                u16::from_le_bytes([raw[0], raw[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let raw = self.take(4)?;
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
            }
            op => return Ok(Instruction::Op(op)),
        };
        Ok(Instruction::Push(self.take(len)?))
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.script.len() {
            return None;
        }
        let item = self.next_instruction();
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}

/// Removes every `OP_CODESEPARATOR` from `script`, as the legacy digest does.
///
/// Bytes from an unparsable push onwards are copied unchanged.
pub fn strip_code_separators(script: &[u8]) -> ByteString {
    let mut out = Vec::with_capacity(script.len());
    let mut iter = instructions(script);
    let mut start = 0;
    loop {
        match iter.next() {
            Some(Ok(Instruction::Op(OP_CODESEPARATOR))) => {
                start = iter.position();
            }
            Some(Ok(_)) => {
                out.extend_from_slice(&script[start..iter.position()]);
                start = iter.position();
            }
            Some(Err(_)) | None => break,
        }
    }
    out.extend_from_slice(&script[start..]);
    out
}

/// Script code committed to by the BIP143 digest for `script_pubkey`.
///
/// P2WPKH programs commit to the equivalent P2PKH script; other scripts are
/// used as given.
pub fn segwit_script_code(script_pubkey: &[u8]) -> ByteString {
    match classify(script_pubkey) {
        ScriptKind::P2wpkh(hash) => build(ScriptTemplate::P2pkh(&hash)).unwrap_or_default(),
        _ => script_pubkey.to_vec(),
    }
}

/// scriptSig `<signature> <public key>`.
pub fn p2pkh_script_sig(signature: &[u8], public_key: &[u8]) -> ByteString {
    let mut script = Vec::with_capacity(signature.len() + public_key.len() + 2);
    push_data(signature, &mut script);
    push_data(public_key, &mut script);
    script
}

/// scriptSig pushing the P2WPKH program of `public_key` as a redeem script.
pub fn p2sh_p2wpkh_script_sig(public_key: &[u8]) -> ByteString {
    let redeem = p2wpkh_for_public_key(public_key);
    let mut script = Vec::with_capacity(redeem.len() + 1);
    push_data(&redeem, &mut script);
    script
}
