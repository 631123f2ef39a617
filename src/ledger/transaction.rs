//! Programmable transaction assembly.
//!
//! The wire model (inputs, commands, the signable `Transaction` envelope
//! and its BCS form) comes from `sui-sdk-types`. This module adds the
//! handle-based builder the engine composes flash-swap legs with, plus a
//! few inspection helpers used by logging and tests.

use serde::Serialize;

pub use sui_sdk_types::{
    Argument, Command, GasPayment, Identifier, Input, MergeCoins, MoveCall,
    ProgrammableTransaction, SplitCoins, Transaction, TransactionExpiration, TransactionKind,
    TransferObjects, TypeTag,
};

use crate::pools::SharedObject;
use crate::types::{FarmError, ObjectId, ObjectReference, SuiAddress};

// ---------------------------------------------------------------------------
// Type tags
// ---------------------------------------------------------------------------

pub fn parse_type(s: &str) -> Result<TypeTag, FarmError> {
    s.trim()
        .parse::<TypeTag>()
        .map_err(|_| FarmError::Decode(format!("invalid Move type: {s}")))
}

/// Compare two Move type strings after normalizing address forms
/// (`0x2::sui::SUI` equals `0x000…002::sui::SUI`).
pub fn same_type(a: &str, b: &str) -> bool {
    match (parse_type(a), parse_type(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Select the `index`-th value of a command result. Other argument kinds
/// are returned unchanged.
pub fn nested(arg: Argument, index: u16) -> Argument {
    match arg {
        Argument::Result(cmd) => Argument::NestedResult(cmd, index),
        other => other,
    }
}

/// `module::function` for Move calls, the command name otherwise.
pub fn command_label(command: &Command) -> String {
    match command {
        Command::MoveCall(call) => format!("{}::{}", call.module.as_str(), call.function.as_str()),
        Command::TransferObjects(_) => "TransferObjects".into(),
        Command::SplitCoins(_) => "SplitCoins".into(),
        Command::MergeCoins(_) => "MergeCoins".into(),
        _ => "Command".into(),
    }
}

pub fn command_labels(ptb: &ProgrammableTransaction) -> Vec<String> {
    ptb.commands.iter().map(command_label).collect()
}

/// Decode a pure input back into its value.
pub fn pure_input<T: serde::de::DeserializeOwned>(
    ptb: &ProgrammableTransaction,
    arg: Argument,
) -> Option<T> {
    match arg {
        Argument::Input(i) => match ptb.inputs.get(i as usize)? {
            Input::Pure { value } => bcs::from_bytes(value).ok(),
            _ => None,
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Incrementally assembles a `ProgrammableTransaction`, handing out
/// `Argument` handles for inputs and command results.
///
/// Object inputs are de-duplicated by id: a shared pool referenced by
/// several calls occupies a single input slot.
#[derive(Debug, Default)]
pub struct PtbBuilder {
    inputs: Vec<Input>,
    commands: Vec<Command>,
}

impl PtbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pure<T: Serialize>(&mut self, value: &T) -> Result<Argument, FarmError> {
        let value = bcs::to_bytes(value)
            .map_err(|e| FarmError::Decode(format!("pure input encoding: {e}")))?;
        Ok(self.push_input(Input::Pure { value }))
    }

    pub fn shared_object(&mut self, object: SharedObject) -> Argument {
        if let Some(existing) = self.find_object(&object.id) {
            return existing;
        }
        self.push_input(Input::Shared {
            object_id: object.id,
            initial_shared_version: object.initial_shared_version,
            mutable: object.mutable,
        })
    }

    pub fn owned_object(&mut self, object_ref: ObjectReference) -> Argument {
        if let Some(existing) = self.find_object(object_ref.object_id()) {
            return existing;
        }
        self.push_input(Input::ImmutableOrOwned(object_ref))
    }

    pub fn move_call(
        &mut self,
        package: ObjectId,
        module: &str,
        function: &str,
        type_arguments: Vec<TypeTag>,
        arguments: Vec<Argument>,
    ) -> Result<Argument, FarmError> {
        let ident = |s: &str| {
            Identifier::new(s).map_err(|_| FarmError::Decode(format!("invalid Move identifier: {s}")))
        };
        Ok(self.command(Command::MoveCall(MoveCall {
            package,
            module: ident(module)?,
            function: ident(function)?,
            type_arguments,
            arguments,
        })))
    }

    pub fn split_coins(&mut self, coin: Argument, amounts: Vec<Argument>) -> Argument {
        self.command(Command::SplitCoins(SplitCoins { coin, amounts }))
    }

    pub fn merge_coins(&mut self, coin: Argument, coins_to_merge: Vec<Argument>) -> Argument {
        self.command(Command::MergeCoins(MergeCoins {
            coin,
            coins_to_merge,
        }))
    }

    pub fn transfer_objects(&mut self, objects: Vec<Argument>, address: Argument) -> Argument {
        self.command(Command::TransferObjects(TransferObjects { objects, address }))
    }

    pub fn finish(self) -> ProgrammableTransaction {
        ProgrammableTransaction {
            inputs: self.inputs,
            commands: self.commands,
        }
    }

    fn command(&mut self, command: Command) -> Argument {
        self.commands.push(command);
        Argument::Result((self.commands.len() - 1) as u16)
    }

    fn push_input(&mut self, input: Input) -> Argument {
        self.inputs.push(input);
        Argument::Input((self.inputs.len() - 1) as u16)
    }

    fn find_object(&self, id: &ObjectId) -> Option<Argument> {
        self.inputs
            .iter()
            .position(|input| match input {
                Input::Shared { object_id, .. } => object_id == id,
                Input::ImmutableOrOwned(r) => r.object_id() == id,
                _ => false,
            })
            .map(|i| Argument::Input(i as u16))
    }
}

// ---------------------------------------------------------------------------
// Transaction envelope
// ---------------------------------------------------------------------------

/// Wrap a programmable transaction with its gas payment. The sender pays
/// for gas.
pub fn programmable_transaction(
    sender: SuiAddress,
    programmable: ProgrammableTransaction,
    gas_objects: Vec<ObjectReference>,
    price: u64,
    budget: u64,
) -> Transaction {
    Transaction {
        kind: TransactionKind::ProgrammableTransaction(programmable),
        sender,
        gas_payment: GasPayment {
            objects: gas_objects,
            owner: sender,
            price,
            budget,
        },
        expiration: TransactionExpiration::None,
    }
}

pub fn encode_transaction(tx: &Transaction) -> Result<Vec<u8>, FarmError> {
    bcs::to_bytes(tx).map_err(|e| FarmError::Decode(format!("transaction encoding: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
