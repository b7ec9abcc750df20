//! The collective qubit-interchange protocol.
//!
//! Before a gate executes, every operand's physical position must lie
//! inside the local span. For each operand whose image is a global
//! position, a free local position is selected, the corresponding halves
//! of every data block are exchanged with the partner ranks, and the
//! permutation is updated to record the swap. All ranks run this in
//! lockstep; partner pairs are disjoint within one interchange.

use crate::core::error::{Error, Result};
use crate::core::index::insert_bit;
use crate::core::layout::Layout;
use crate::core::permutation::Permutation;
use crate::core::qubit::Qubit;
use crate::core::transport::Transport;
use crate::maths::Amplitude;

/// Ensures every operand of the coming gate has a local physical image,
/// exchanging amplitude halves and updating `permutation` as needed.
pub fn maybe_interchange_qubits<T: Transport>(
    layout: &Layout,
    transport: &mut T,
    state: &mut [Amplitude],
    permutation: &mut Permutation,
    buffer: &mut [Amplitude],
    num_local_qubits: u32,
    operands: &[Qubit],
) -> Result<()> {
    for &operand in operands {
        let global = permutation.to_physical(operand);
        if global.index() < num_local_qubits {
            continue;
        }

        let local = select_free_local_position(permutation, operands, num_local_qubits)?;
        interchange_positions(
            layout,
            transport,
            state,
            buffer,
            num_local_qubits,
            global,
            local,
        )?;
        permutation.swap_positions(global, local);
    }
    Ok(())
}

/// Highest local position not holding any operand's image.
fn select_free_local_position(
    permutation: &Permutation,
    operands: &[Qubit],
    num_local_qubits: u32,
) -> Result<Qubit> {
    for position in (0..num_local_qubits).rev() {
        let taken = operands
            .iter()
            .any(|&q| permutation.to_physical(q).index() == position);
        if !taken {
            return Ok(Qubit(position));
        }
    }
    Err(Error::PermutationInvariant(
        "no free local position for interchange".to_string(),
    ))
}

/// Physically swaps qubit positions `global` (>= L) and `local` (< L):
/// for every data block, the half with the local bit opposite to the
/// block's global bit changes places with the mirror half of the partner
/// block.
fn interchange_positions<T: Transport>(
    layout: &Layout,
    transport: &mut T,
    state: &mut [Amplitude],
    buffer: &mut [Amplitude],
    num_local_qubits: u32,
    global: Qubit,
    local: Qubit,
) -> Result<()> {
    let block_bit = global.index() - num_local_qubits;
    let block_size = 1usize << num_local_qubits;
    let half_len = 1u64 << (num_local_qubits - 1);
    let local_mask = local.mask();
    let num_blocks = layout.num_data_blocks();
    let rank = transport.rank();

    for block in 0..num_blocks {
        let block_global = layout.block_global(rank, block);
        let bit = (block_global >> block_bit) & 1;
        let partner_global = block_global ^ (1u64 << block_bit);
        let partner_rank = layout.rank_of_block(partner_global);

        if partner_rank == rank {
            // Both blocks live here; swap in memory, once per pair.
            if block_global < partner_global {
                let partner_block = layout.local_block(partner_global) as usize;
                let (lower, upper) = state.split_at_mut(partner_block * block_size);
                let own = &mut lower[block as usize * block_size..][..block_size];
                let other = &mut upper[..block_size];
                for v in 0..half_len {
                    let loc = insert_bit(v, local.index(), 1 - bit) as usize;
                    std::mem::swap(&mut own[loc], &mut other[loc ^ local_mask as usize]);
                }
            }
            continue;
        }

        // Remote partner: slice the half through the transfer buffer.
        let capacity = (buffer.len() / 2).max(1);
        let (send, recv) = buffer.split_at_mut(capacity);
        let block_data = &mut state[block as usize * block_size..][..block_size];

        let mut offset = 0u64;
        while offset < half_len {
            let count = capacity.min((half_len - offset) as usize);
            for i in 0..count {
                let loc = insert_bit(offset + i as u64, local.index(), 1 - bit) as usize;
                send[i] = block_data[loc];
            }
            transport.exchange(partner_rank, &send[..count], &mut recv[..count])?;
            for i in 0..count {
                let loc = insert_bit(offset + i as u64, local.index(), 1 - bit) as usize;
                block_data[loc] = recv[i];
            }
            offset += count as u64;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{ChannelGroup, SingleProcess};
    use num_complex::Complex64;

    fn amp(v: u64) -> Amplitude {
        Complex64::new(v as f64, 0.0)
    }

    fn swap_bits(i: u64, a: u32, b: u32) -> u64 {
        let ba = (i >> a) & 1;
        let bb = (i >> b) & 1;
        let mut out = i & !(1 << a) & !(1 << b);
        out |= bb << a;
        out |= ba << b;
        out
    }

    #[test]
    fn two_rank_interchange_relocates_amplitudes() {
        // n = 3, L = 2, P = 2: global physical index = (rank << 2) | loc.
        let groups = ChannelGroup::connected(2);
        let handles: Vec<_> = groups
            .into_iter()
            .map(|mut transport| {
                std::thread::spawn(move || {
                    let rank = transport.rank() as u64;
                    let mut state: Vec<Amplitude> =
                        (0..4).map(|loc| amp((rank << 2) | loc)).collect();
                    let mut permutation = Permutation::identity(3);
                    let mut buffer = vec![Complex64::ZERO; 2];
                    maybe_interchange_qubits(
                        &Layout::Simple,
                        &mut transport,
                        &mut state,
                        &mut permutation,
                        &mut buffer,
                        2,
                        &[Qubit(2)],
                    )
                    .unwrap();
                    (rank, state, permutation)
                })
            })
            .collect();

        for handle in handles {
            let (rank, state, permutation) = handle.join().unwrap();
            // Qubit 2 moved to the freest local position, 1.
            assert_eq!(permutation.to_physical(Qubit(2)), Qubit(1));
            assert_eq!(permutation.to_physical(Qubit(1)), Qubit(2));
            // Amplitude now at (rank, loc) is the old one at swapped bits.
            for loc in 0..4u64 {
                let here = (rank << 2) | loc;
                let expected = swap_bits(here, 1, 2);
                assert_eq!(state[loc as usize], amp(expected));
            }
        }
    }

    #[test]
    fn unit_layout_swaps_blocks_locally() {
        // n = 3, L = 2, one rank with two data blocks: the partner block
        // always lives here, so no transport traffic occurs.
        let layout = Layout::Unit { num_data_blocks: 2 };
        let mut transport = SingleProcess;
        let mut state: Vec<Amplitude> = (0..8).map(amp).collect();
        let mut permutation = Permutation::identity(3);
        let mut buffer = vec![Complex64::ZERO; 2];
        maybe_interchange_qubits(
            &layout,
            &mut transport,
            &mut state,
            &mut permutation,
            &mut buffer,
            2,
            &[Qubit(2)],
        )
        .unwrap();
        for i in 0..8u64 {
            assert_eq!(state[i as usize], amp(swap_bits(i, 1, 2)));
        }
    }

    #[test]
    fn local_operands_leave_state_untouched() {
        let mut transport = SingleProcess;
        let mut state: Vec<Amplitude> = (0..8).map(amp).collect();
        let snapshot = state.clone();
        let mut permutation = Permutation::identity(3);
        let mut buffer = vec![Complex64::ZERO; 2];
        maybe_interchange_qubits(
            &Layout::Simple,
            &mut transport,
            &mut state,
            &mut permutation,
            &mut buffer,
            3,
            &[Qubit(0), Qubit(2)],
        )
        .unwrap();
        assert_eq!(state, snapshot);
        assert_eq!(permutation, Permutation::identity(3));
    }
}
