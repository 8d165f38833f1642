//! Restartable multi-word transfers.
//!
//! With 68030 MMU emulation, an access fault aborts the instruction and the
//! CPU later restarts it from the beginning. Transfers that move many long
//! words (FMOVEM, FSAVE) record how far they got so the restarted instruction
//! skips the words that already went through.

use log::*;
use serde::{Deserialize, Serialize};

use crate::types::{Address, Long};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferCursor {
    /// PC of the instruction the cursor belongs to
    owner: Option<Address>,
    /// Long words completed
    index: usize,
    /// The faulted access was completed by the fault handler
    replay: bool,
    /// Long word of the faulted access
    data_buffer: Long,
    /// Words of the register being loaded, received so far
    partial: [Long; 2],
    /// Effective address captured on the first attempt
    base: Address,
}

impl TransferCursor {
    /// Attaches the cursor to an instruction. Returns true when resuming an
    /// interrupted transfer of the same instruction.
    pub(super) fn begin(&mut self, pc: Address, base: Address) -> bool {
        if self.owner == Some(pc) {
            debug!(
                "Resuming FPU transfer at {:08X}, {} words done",
                pc, self.index
            );
            return true;
        }
        *self = Self {
            owner: Some(pc),
            base,
            ..Default::default()
        };
        false
    }

    /// Transfer completed, detach
    pub(super) fn finish(&mut self) {
        *self = Self::default();
    }

    /// Abandons an interrupted transfer (e.g. the faulting process is gone)
    pub fn reset(&mut self) {
        self.finish();
    }

    /// Called by the fault handler after it performed the faulted access
    /// itself. For reads, `data` is the long word fetched.
    pub fn complete_pending(&mut self, data: Long) {
        self.replay = true;
        self.data_buffer = data;
    }

    pub fn in_flight(&self) -> bool {
        self.owner.is_some()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Long word involved in the last (possibly faulted) access
    pub fn data_buffer(&self) -> Long {
        self.data_buffer
    }

    pub(super) fn base(&self) -> Address {
        self.base
    }

    /// Position `pos` has not been transferred yet
    pub(super) fn pending(&self, pos: usize) -> bool {
        self.index == pos
    }

    /// Stores a word of a register being written to memory. Returns true if
    /// the bus access still has to be made.
    pub(super) fn stage_write(&mut self, value: Long) -> bool {
        if self.replay {
            self.replay = false;
            false
        } else {
            self.data_buffer = value;
            true
        }
    }

    /// Returns the word delivered by the fault handler, if any
    pub(super) fn take_read(&mut self) -> Option<Long> {
        if self.replay {
            self.replay = false;
            Some(self.data_buffer)
        } else {
            None
        }
    }

    pub(super) fn advance(&mut self) {
        self.index += 1;
    }

    pub(super) fn set_partial(&mut self, i: usize, value: Long) {
        self.partial[i] = value;
    }

    pub(super) fn partial(&self, i: usize) -> Long {
        self.partial[i]
    }
}
