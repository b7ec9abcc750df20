//! The simulator façade: owns the local state blocks, the permutation,
//! the transfer buffer and the on-cache scratch, and exposes one method
//! per gate kind plus fusion control and the measurement family.
//!
//! Every gate call follows the same path: operand validation, capacity
//! check, interchange to restore locality, then per-block dispatch through
//! the cache-tiered engine. Collective operations (interchange and the
//! measurement reductions) run in lockstep across the process group; all
//! ranks seed the same RNG, so sampling decisions agree everywhere.

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::cache::{self, GateKernel, Strategy, Tuning};
use crate::core::error::{Error, Result};
use crate::core::fusion::FusedGateList;
use crate::core::gates::matrices::{self, DenseMatrix};
use crate::core::gates::{
    ExpPauliXKernel, ExpPauliYKernel, ExpPauliZKernel, ExpSwapKernel, HadamardKernel,
    PauliXKernel, PauliYKernel, PauliZKernel, PhaseCoeffKernel, PhaseShift2Kernel,
    PhaseShift3Kernel, SwapKernel, XRotationHalfPiKernel, YRotationHalfPiKernel,
};
use crate::core::index::IndexForm;
use crate::core::interchange::maybe_interchange_qubits;
use crate::core::layout::Layout;
use crate::core::measurement;
use crate::core::permutation::Permutation;
use crate::core::qubit::{Control, Qubit};
use crate::core::transport::{SingleProcess, Transport};
use crate::maths::{exp_i, Amplitude};

pub const DEFAULT_NUM_ELEMENTS_IN_BUFFER: usize = 65536;

/// Constructor parameters; chainable in the builder style.
#[derive(Clone, Debug)]
pub struct SimulatorBuilder {
    total_num_qubits: u32,
    num_local_qubits: Option<u32>,
    num_data_blocks: u64,
    initial_integer: u64,
    seed: u64,
    initial_permutation: Option<Vec<u32>>,
    num_elements_in_buffer: usize,
    tuning: Tuning,
    max_fused_qubits: Option<usize>,
    num_threads: Option<usize>,
}

impl SimulatorBuilder {
    pub fn new(total_num_qubits: u32) -> SimulatorBuilder {
        SimulatorBuilder {
            total_num_qubits,
            num_local_qubits: None,
            num_data_blocks: 1,
            initial_integer: 0,
            seed: 0,
            initial_permutation: None,
            num_elements_in_buffer: DEFAULT_NUM_ELEMENTS_IN_BUFFER,
            tuning: Tuning::default(),
            max_fused_qubits: None,
            num_threads: None,
        }
    }

    pub fn num_local_qubits(mut self, num_local_qubits: u32) -> Self {
        self.num_local_qubits = Some(num_local_qubits);
        self
    }

    pub fn num_data_blocks(mut self, num_data_blocks: u64) -> Self {
        self.num_data_blocks = num_data_blocks;
        self
    }

    pub fn initial_integer(mut self, initial_integer: u64) -> Self {
        self.initial_integer = initial_integer;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn initial_permutation(mut self, table: Vec<u32>) -> Self {
        self.initial_permutation = Some(table);
        self
    }

    pub fn num_elements_in_buffer(mut self, num_elements: usize) -> Self {
        self.num_elements_in_buffer = num_elements;
        self
    }

    pub fn num_on_cache_qubits(mut self, num_on_cache_qubits: u32) -> Self {
        self.tuning.num_on_cache_qubits = num_on_cache_qubits;
        self
    }

    pub fn max_operated_qubits(mut self, max_operated_qubits: usize) -> Self {
        self.tuning.max_operated_qubits = max_operated_qubits;
        self
    }

    pub fn max_fused_qubits(mut self, max_fused_qubits: usize) -> Self {
        self.max_fused_qubits = Some(max_fused_qubits);
        self
    }

    pub fn index_form(mut self, index_form: IndexForm) -> Self {
        self.tuning.index_form = index_form;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.tuning.strategy = strategy;
        self
    }

    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn build_local(self) -> Result<Simulator<SingleProcess>> {
        self.build(SingleProcess)
    }

    pub fn build<T: Transport>(self, transport: T) -> Result<Simulator<T>> {
        let n = self.total_num_qubits;
        if n == 0 || n >= 64 {
            return Err(Error::InvalidConfiguration(format!(
                "total_num_qubits {} out of range",
                n
            )));
        }
        let l = self.num_local_qubits.unwrap_or(n);
        if l == 0 || l > n {
            return Err(Error::InvalidConfiguration(format!(
                "num_local_qubits {} out of range for {} qubits",
                l, n
            )));
        }
        let b = self.num_data_blocks;
        if b == 0 || !b.is_power_of_two() {
            return Err(Error::InvalidConfiguration(format!(
                "num_data_blocks {} must be a power of two",
                b
            )));
        }
        let p = transport.size() as u64;
        if p * b != 1u64 << (n - l) {
            return Err(Error::InvalidConfiguration(format!(
                "{} ranks x {} blocks cannot cover 2^{} global blocks",
                p,
                b,
                n - l
            )));
        }
        if self.initial_integer >= 1u64 << n {
            return Err(Error::InvalidInitialState {
                state: self.initial_integer,
                num_qubits: n,
            });
        }

        let permutation = match &self.initial_permutation {
            Some(table) => {
                if table.len() as u32 != n {
                    return Err(Error::PermutationInvariant(format!(
                        "initial permutation has {} entries for {} qubits",
                        table.len(),
                        n
                    )));
                }
                Permutation::from_table(table)?
            }
            None => Permutation::identity(n),
        };

        let policy = match self.num_threads {
            None => crate::core::loops::Policy::Sequential,
            Some(t) => crate::core::loops::Policy::parallel_with(t)?,
        };

        let layout = if b == 1 {
            Layout::Simple
        } else {
            Layout::Unit {
                num_data_blocks: b,
            }
        };

        let block_size = 1usize << l;
        let data = vec![Complex64::ZERO; block_size * b as usize];
        let scratch_len = if l > self.tuning.num_on_cache_qubits {
            1usize << self.tuning.num_on_cache_qubits
        } else {
            0
        };
        let max_fused_qubits = self
            .max_fused_qubits
            .unwrap_or_else(|| (self.tuning.num_on_cache_qubits.saturating_sub(1).max(1) as usize).min(l as usize));

        let mut simulator = Simulator {
            total_num_qubits: n,
            num_local_qubits: l,
            block_size,
            layout,
            data,
            permutation,
            buffer: vec![Complex64::ZERO; self.num_elements_in_buffer.max(2)],
            scratch: vec![Complex64::ZERO; scratch_len],
            policy,
            tuning: self.tuning,
            max_fused_qubits,
            rng: StdRng::seed_from_u64(self.seed),
            transport,
            fusion: None,
        };
        simulator.write_basis_state(self.initial_integer);
        Ok(simulator)
    }
}

pub struct Simulator<T: Transport> {
    total_num_qubits: u32,
    num_local_qubits: u32,
    block_size: usize,
    layout: Layout,
    data: Vec<Amplitude>,
    permutation: Permutation,
    buffer: Vec<Amplitude>,
    scratch: Vec<Amplitude>,
    policy: crate::core::loops::Policy,
    tuning: Tuning,
    max_fused_qubits: usize,
    rng: StdRng,
    transport: T,
    fusion: Option<FusedGateList>,
}

impl<T: Transport> std::fmt::Debug for Simulator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("total_num_qubits", &self.total_num_qubits)
            .field("num_local_qubits", &self.num_local_qubits)
            .field("block_size", &self.block_size)
            .field("layout", &self.layout)
            .field("permutation", &self.permutation)
            .field("tuning", &self.tuning)
            .field("max_fused_qubits", &self.max_fused_qubits)
            .finish_non_exhaustive()
    }
}

fn operand_list(targets: &[Qubit], controls: &[Control]) -> Vec<Qubit> {
    targets
        .iter()
        .copied()
        .chain(controls.iter().map(|c| c.qubit()))
        .collect()
}

impl<T: Transport> Simulator<T> {
    pub fn builder(total_num_qubits: u32) -> SimulatorBuilder {
        SimulatorBuilder::new(total_num_qubits)
    }

    pub fn total_num_qubits(&self) -> u32 {
        self.total_num_qubits
    }

    pub fn num_local_qubits(&self) -> u32 {
        self.num_local_qubits
    }

    pub fn num_data_blocks(&self) -> u64 {
        self.layout.num_data_blocks()
    }

    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }

    pub fn local_amplitudes(&self) -> &[Amplitude] {
        &self.data
    }

    pub fn fusion_open(&self) -> bool {
        self.fusion.is_some()
    }

    /// The amplitude of a logical basis state, if this rank owns it.
    pub fn amplitude(&self, logical: u64) -> Option<Amplitude> {
        let physical = self.permutation.permute_bits(logical);
        self.owned_slot(physical).map(|slot| self.data[slot])
    }

    /// The full state vector in logical basis order. Only meaningful when
    /// a single process owns the whole state.
    pub fn state_vector(&self) -> Result<Vec<Amplitude>> {
        if self.transport.size() != 1 {
            return Err(Error::InvalidConfiguration(
                "state_vector requires a single-process group".to_string(),
            ));
        }
        let mut out = vec![Complex64::ZERO; 1 << self.total_num_qubits];
        for (block, amplitudes) in self.data.chunks_exact(self.block_size).enumerate() {
            let block_global = self.layout.block_global(0, block as u64);
            for (local, &amplitude) in amplitudes.iter().enumerate() {
                let physical = (block_global << self.num_local_qubits) | local as u64;
                out[self.permutation.unpermute_bits(physical) as usize] = amplitude;
            }
        }
        Ok(out)
    }

    pub fn probabilities(&self) -> Result<Vec<f64>> {
        Ok(self.state_vector()?.iter().map(|a| a.norm_sqr()).collect())
    }

    /// Re-initializes to a computational basis state.
    pub fn reset(&mut self, initial_integer: u64) -> Result<()> {
        self.require_no_fusion()?;
        if initial_integer >= 1u64 << self.total_num_qubits {
            return Err(Error::InvalidInitialState {
                state: initial_integer,
                num_qubits: self.total_num_qubits,
            });
        }
        self.write_basis_state(initial_integer);
        Ok(())
    }

    fn write_basis_state(&mut self, logical: u64) {
        self.data.fill(Complex64::ZERO);
        let physical = self.permutation.permute_bits(logical);
        if let Some(slot) = self.owned_slot(physical) {
            self.data[slot] = Complex64::ONE;
        }
    }

    fn owned_slot(&self, physical: u64) -> Option<usize> {
        let block_global = physical >> self.num_local_qubits;
        if self.layout.rank_of_block(block_global) != self.transport.rank() {
            return None;
        }
        let block = self.layout.local_block(block_global) as usize;
        let local = (physical & ((1u64 << self.num_local_qubits) - 1)) as usize;
        Some(block * self.block_size + local)
    }

    fn require_no_fusion(&self) -> Result<()> {
        if self.fusion.is_some() {
            Err(Error::FusionOpen)
        } else {
            Ok(())
        }
    }

    fn validate_operands(&self, gate: &'static str, operands: &[Qubit]) -> Result<()> {
        for (i, q) in operands.iter().enumerate() {
            if q.index() >= self.total_num_qubits {
                return Err(Error::InvalidConfiguration(format!(
                    "{}: qubit {} out of range for {} qubits",
                    gate,
                    q.index(),
                    self.total_num_qubits
                )));
            }
            if operands[..i].contains(q) {
                return Err(Error::InvalidConfiguration(format!(
                    "{}: duplicate operand qubit {}",
                    gate,
                    q.index()
                )));
            }
        }
        Ok(())
    }

    fn check_capacity(&self, gate: &'static str, requested: usize, limit: usize) -> Result<()> {
        let limit = limit.min(self.num_local_qubits as usize);
        if requested > limit {
            return Err(Error::TooManyOperatedQubits {
                gate,
                requested,
                limit,
            });
        }
        Ok(())
    }

    fn localize(&mut self, operands: &[Qubit]) -> Result<()> {
        maybe_interchange_qubits(
            &self.layout,
            &mut self.transport,
            &mut self.data,
            &mut self.permutation,
            &mut self.buffer,
            self.num_local_qubits,
            operands,
        )
    }

    fn apply_kernel<K: GateKernel>(
        &mut self,
        gate: &'static str,
        operands: &[Qubit],
        kernel: &K,
        max_operated: usize,
    ) -> Result<()> {
        self.check_capacity(gate, operands.len(), max_operated)?;
        self.localize(operands)?;
        let physical: Vec<Qubit> = operands
            .iter()
            .map(|&q| self.permutation.to_physical(q))
            .collect();
        let tuning = Tuning {
            max_operated_qubits: max_operated,
            ..self.tuning
        };
        for block in self.data.chunks_exact_mut(self.block_size) {
            cache::apply_gate(
                &self.policy,
                &tuning,
                block,
                &mut self.scratch,
                &physical,
                gate,
                kernel,
            )?;
        }
        Ok(())
    }

    /// Records the gate into an open fusion, or dispatches it.
    fn fused_or_apply<K: GateKernel>(
        &mut self,
        gate: &'static str,
        operands: Vec<Qubit>,
        kernel: K,
        full_matrix: DenseMatrix,
    ) -> Result<()> {
        self.validate_operands(gate, &operands)?;
        self.check_capacity(gate, operands.len(), self.tuning.max_operated_qubits)?;
        let cap = self.max_fused_qubits.min(self.num_local_qubits as usize);
        if let Some(fusion) = self.fusion.as_mut() {
            fusion.push(gate, full_matrix, operands, cap)?;
            return Ok(());
        }
        self.apply_kernel(gate, &operands, &kernel, self.tuning.max_operated_qubits)
    }

    fn unitary<K: GateKernel>(
        &mut self,
        gate: &'static str,
        targets: &[Qubit],
        controls: &[Control],
        kernel: K,
        target_matrix: &DenseMatrix,
    ) -> Result<()> {
        let operands = operand_list(targets, controls);
        let full_matrix = matrices::controlled(target_matrix, controls.len() as u32);
        self.fused_or_apply(gate, operands, kernel, full_matrix)
    }

    // --- gate catalog ------------------------------------------------

    pub fn identity(&mut self, target: Qubit) -> Result<()> {
        self.identity_n(&[target])
    }

    pub fn adj_identity(&mut self, target: Qubit) -> Result<()> {
        self.identity(target)
    }

    /// The n-target identity: validated like any gate, touches nothing.
    pub fn identity_n(&mut self, targets: &[Qubit]) -> Result<()> {
        self.validate_operands("identity", targets)?;
        self.check_capacity("identity", targets.len(), self.tuning.max_operated_qubits)?;
        Ok(())
    }

    pub fn adj_identity_n(&mut self, targets: &[Qubit]) -> Result<()> {
        self.identity_n(targets)
    }

    pub fn hadamard(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.unitary(
            "hadamard",
            &[target],
            controls,
            HadamardKernel::new(controls.len() as u32),
            &matrices::HADAMARD,
        )
    }

    pub fn adj_hadamard(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.hadamard(target, controls)
    }

    pub fn pauli_x(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.unitary(
            "pauli_x",
            &[target],
            controls,
            PauliXKernel::new(1, controls.len() as u32),
            &matrices::PAULI_X,
        )
    }

    pub fn adj_pauli_x(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.pauli_x(target, controls)
    }

    /// The Pauli-X product X⊗…⊗X over `targets`.
    pub fn pauli_xn(&mut self, targets: &[Qubit], controls: &[Control]) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::InvalidConfiguration(
                "pauli_xn: no target qubits".to_string(),
            ));
        }
        self.unitary(
            "pauli_xn",
            targets,
            controls,
            PauliXKernel::new(targets.len() as u32, controls.len() as u32),
            &matrices::pauli_x_product(targets.len() as u32),
        )
    }

    pub fn adj_pauli_xn(&mut self, targets: &[Qubit], controls: &[Control]) -> Result<()> {
        self.pauli_xn(targets, controls)
    }

    pub fn pauli_y(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.unitary(
            "pauli_y",
            &[target],
            controls,
            PauliYKernel::new(1, controls.len() as u32),
            &matrices::PAULI_Y,
        )
    }

    pub fn adj_pauli_y(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.pauli_y(target, controls)
    }

    pub fn pauli_yn(&mut self, targets: &[Qubit], controls: &[Control]) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::InvalidConfiguration(
                "pauli_yn: no target qubits".to_string(),
            ));
        }
        self.unitary(
            "pauli_yn",
            targets,
            controls,
            PauliYKernel::new(targets.len() as u32, controls.len() as u32),
            &matrices::pauli_y_product(targets.len() as u32),
        )
    }

    pub fn adj_pauli_yn(&mut self, targets: &[Qubit], controls: &[Control]) -> Result<()> {
        self.pauli_yn(targets, controls)
    }

    pub fn pauli_z(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.unitary(
            "pauli_z",
            &[target],
            controls,
            PauliZKernel::new(1, controls.len() as u32),
            &matrices::PAULI_Z,
        )
    }

    pub fn adj_pauli_z(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.pauli_z(target, controls)
    }

    pub fn pauli_zn(&mut self, targets: &[Qubit], controls: &[Control]) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::InvalidConfiguration(
                "pauli_zn: no target qubits".to_string(),
            ));
        }
        self.unitary(
            "pauli_zn",
            targets,
            controls,
            PauliZKernel::new(targets.len() as u32, controls.len() as u32),
            &matrices::pauli_z_product(targets.len() as u32),
        )
    }

    pub fn adj_pauli_zn(&mut self, targets: &[Qubit], controls: &[Control]) -> Result<()> {
        self.pauli_zn(targets, controls)
    }

    pub fn toffoli(&mut self, target: Qubit, control1: Control, control2: Control) -> Result<()> {
        self.pauli_x(target, &[control1, control2])
    }

    pub fn swap(&mut self, qubit1: Qubit, qubit2: Qubit, controls: &[Control]) -> Result<()> {
        self.unitary(
            "swap",
            &[qubit1, qubit2],
            controls,
            SwapKernel::new(controls.len() as u32),
            &matrices::SWAP,
        )
    }

    pub fn adj_swap(&mut self, qubit1: Qubit, qubit2: Qubit, controls: &[Control]) -> Result<()> {
        self.swap(qubit1, qubit2, controls)
    }

    /// Direct coefficient-form phase shift: multiplies the amplitudes with
    /// every control set by `coefficient`. With no controls this is a
    /// global phase.
    pub fn phase_shift_coeff(
        &mut self,
        coefficient: Amplitude,
        controls: &[Control],
    ) -> Result<()> {
        let operands: Vec<Qubit> = controls.iter().map(|c| c.qubit()).collect();
        let num_operands = operands.len() as u32;
        self.fused_or_apply(
            "phase_shift_coeff",
            operands,
            PhaseCoeffKernel::new(coefficient, num_operands),
            matrices::phase_coeff(coefficient, num_operands),
        )
    }

    pub fn adj_phase_shift_coeff(
        &mut self,
        coefficient: Amplitude,
        controls: &[Control],
    ) -> Result<()> {
        self.phase_shift_coeff(coefficient.conj(), controls)
    }

    pub fn u1(&mut self, phase: f64, controls: &[Control]) -> Result<()> {
        self.phase_shift_coeff(exp_i(phase), controls)
    }

    pub fn adj_u1(&mut self, phase: f64, controls: &[Control]) -> Result<()> {
        self.u1(-phase, controls)
    }

    pub fn u2(
        &mut self,
        phase1: f64,
        phase2: f64,
        target: Qubit,
        controls: &[Control],
    ) -> Result<()> {
        self.unitary(
            "u2",
            &[target],
            controls,
            PhaseShift2Kernel::new(phase1, phase2, controls.len() as u32),
            &matrices::u2(phase1, phase2),
        )
    }

    pub fn adj_u2(
        &mut self,
        phase1: f64,
        phase2: f64,
        target: Qubit,
        controls: &[Control],
    ) -> Result<()> {
        use std::f64::consts::PI;
        self.u2(PI - phase2, PI - phase1, target, controls)
    }

    pub fn u3(
        &mut self,
        phase1: f64,
        phase2: f64,
        phase3: f64,
        target: Qubit,
        controls: &[Control],
    ) -> Result<()> {
        self.unitary(
            "u3",
            &[target],
            controls,
            PhaseShift3Kernel::new(phase1, phase2, phase3, controls.len() as u32),
            &matrices::u3(phase1, phase2, phase3),
        )
    }

    pub fn adj_u3(
        &mut self,
        phase1: f64,
        phase2: f64,
        phase3: f64,
        target: Qubit,
        controls: &[Control],
    ) -> Result<()> {
        self.u3(-phase1, -phase3, -phase2, target, controls)
    }

    pub fn x_rotation_half_pi(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.unitary(
            "x_rotation_half_pi",
            &[target],
            controls,
            XRotationHalfPiKernel::new(false, controls.len() as u32),
            &matrices::x_rotation_half_pi(false),
        )
    }

    pub fn adj_x_rotation_half_pi(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.unitary(
            "adj_x_rotation_half_pi",
            &[target],
            controls,
            XRotationHalfPiKernel::new(true, controls.len() as u32),
            &matrices::x_rotation_half_pi(true),
        )
    }

    pub fn y_rotation_half_pi(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.unitary(
            "y_rotation_half_pi",
            &[target],
            controls,
            YRotationHalfPiKernel::new(false, controls.len() as u32),
            &matrices::y_rotation_half_pi(false),
        )
    }

    pub fn adj_y_rotation_half_pi(&mut self, target: Qubit, controls: &[Control]) -> Result<()> {
        self.unitary(
            "adj_y_rotation_half_pi",
            &[target],
            controls,
            YRotationHalfPiKernel::new(true, controls.len() as u32),
            &matrices::y_rotation_half_pi(true),
        )
    }

    pub fn exp_pauli_x(
        &mut self,
        phase: f64,
        targets: &[Qubit],
        controls: &[Control],
    ) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::InvalidConfiguration(
                "exp_pauli_x: no target qubits".to_string(),
            ));
        }
        self.unitary(
            "exp_pauli_x",
            targets,
            controls,
            ExpPauliXKernel::new(phase, targets.len() as u32, controls.len() as u32),
            &matrices::exp_pauli_x(phase, targets.len() as u32),
        )
    }

    pub fn adj_exp_pauli_x(
        &mut self,
        phase: f64,
        targets: &[Qubit],
        controls: &[Control],
    ) -> Result<()> {
        self.exp_pauli_x(-phase, targets, controls)
    }

    pub fn exp_pauli_y(
        &mut self,
        phase: f64,
        targets: &[Qubit],
        controls: &[Control],
    ) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::InvalidConfiguration(
                "exp_pauli_y: no target qubits".to_string(),
            ));
        }
        self.unitary(
            "exp_pauli_y",
            targets,
            controls,
            ExpPauliYKernel::new(phase, targets.len() as u32, controls.len() as u32),
            &matrices::exp_pauli_y(phase, targets.len() as u32),
        )
    }

    pub fn adj_exp_pauli_y(
        &mut self,
        phase: f64,
        targets: &[Qubit],
        controls: &[Control],
    ) -> Result<()> {
        self.exp_pauli_y(-phase, targets, controls)
    }

    pub fn exp_pauli_z(
        &mut self,
        phase: f64,
        targets: &[Qubit],
        controls: &[Control],
    ) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::InvalidConfiguration(
                "exp_pauli_z: no target qubits".to_string(),
            ));
        }
        self.unitary(
            "exp_pauli_z",
            targets,
            controls,
            ExpPauliZKernel::new(phase, targets.len() as u32, controls.len() as u32),
            &matrices::exp_pauli_z(phase, targets.len() as u32),
        )
    }

    pub fn adj_exp_pauli_z(
        &mut self,
        phase: f64,
        targets: &[Qubit],
        controls: &[Control],
    ) -> Result<()> {
        self.exp_pauli_z(-phase, targets, controls)
    }

    pub fn exp_swap(
        &mut self,
        phase: f64,
        qubit1: Qubit,
        qubit2: Qubit,
        controls: &[Control],
    ) -> Result<()> {
        self.unitary(
            "exp_swap",
            &[qubit1, qubit2],
            controls,
            ExpSwapKernel::new(phase, controls.len() as u32),
            &matrices::exp_swap(phase),
        )
    }

    pub fn adj_exp_swap(
        &mut self,
        phase: f64,
        qubit1: Qubit,
        qubit2: Qubit,
        controls: &[Control],
    ) -> Result<()> {
        self.exp_swap(-phase, qubit1, qubit2, controls)
    }

    // --- fusion ------------------------------------------------------

    pub fn begin_fusion(&mut self) -> Result<()> {
        if self.fusion.is_some() {
            return Err(Error::FusionOpen);
        }
        self.fusion = Some(FusedGateList::new());
        Ok(())
    }

    pub fn end_fusion(&mut self) -> Result<()> {
        let list = self.fusion.take().ok_or_else(|| {
            Error::InvalidConfiguration("end_fusion without begin_fusion".to_string())
        })?;
        if list.is_empty() {
            return Ok(());
        }
        let fused: Vec<Qubit> = list.fused_qubits().to_vec();
        let kernel = list.into_kernel();
        let cap = self.max_fused_qubits.min(self.num_local_qubits as usize);
        self.apply_kernel("fused", &fused, &kernel, cap)
    }

    // --- measurement family ------------------------------------------

    /// Measures one qubit projectively; collapses and renormalizes.
    pub fn projective_measurement(&mut self, qubit: Qubit) -> Result<u8> {
        self.require_no_fusion()?;
        self.validate_operands("projective_measurement", &[qubit])?;
        self.localize(&[qubit])?;
        let position = self.permutation.to_physical(qubit).index();

        let mut local_one = 0.0;
        let mut local_zero = 0.0;
        for block in self.data.chunks_exact(self.block_size) {
            local_one += measurement::probability_of_bit(&self.policy, block, position, 1);
            local_zero += measurement::probability_of_bit(&self.policy, block, position, 0);
        }
        let one: f64 = self.transport.all_gather_f64(local_one)?.iter().sum();
        let zero: f64 = self.transport.all_gather_f64(local_zero)?.iter().sum();

        let draw: f64 = self.rng.random::<f64>() * (zero + one);
        let outcome: u8 = if draw < one { 1 } else { 0 };
        let mass = if outcome == 1 { one } else { zero };
        let scale = if mass > 0.0 { 1.0 / mass.sqrt() } else { 0.0 };
        for block in self.data.chunks_exact_mut(self.block_size) {
            measurement::collapse_bit(&self.policy, block, position, outcome as u64, scale);
        }
        Ok(outcome)
    }

    /// Projects `qubit` onto |0⟩ and renormalizes.
    pub fn clear(&mut self, qubit: Qubit) -> Result<()> {
        self.project_onto(qubit, 0)
    }

    /// Projects `qubit` onto |1⟩ and renormalizes.
    pub fn set(&mut self, qubit: Qubit) -> Result<()> {
        self.project_onto(qubit, 1)
    }

    fn project_onto(&mut self, qubit: Qubit, keep_bit: u64) -> Result<()> {
        self.require_no_fusion()?;
        self.validate_operands("project", &[qubit])?;
        self.localize(&[qubit])?;
        let position = self.permutation.to_physical(qubit).index();
        let mut local = 0.0;
        for block in self.data.chunks_exact(self.block_size) {
            local += measurement::probability_of_bit(&self.policy, block, position, keep_bit);
        }
        let mass: f64 = self.transport.all_gather_f64(local)?.iter().sum();
        // A zero-mass projection leaves the zero vector; it propagates as
        // ordinary IEEE data.
        let scale = if mass > 0.0 { 1.0 / mass.sqrt() } else { 0.0 };
        for block in self.data.chunks_exact_mut(self.block_size) {
            measurement::collapse_bit(&self.policy, block, position, keep_bit, scale);
        }
        Ok(())
    }

    /// Complete measurement: samples a basis state, collapses onto it and
    /// returns its logical integer.
    pub fn measure(&mut self) -> Result<u64> {
        self.require_no_fusion()?;
        let masses = self.gather_masses()?;
        let total: f64 = masses.iter().sum();
        let draw = self.rng.random::<f64>() * total;
        let outcome = self.sample_global(&masses, draw)?;
        self.write_basis_state(outcome);
        Ok(outcome)
    }

    /// Samples `num_events` basis states from the current distribution
    /// without collapsing.
    pub fn generate_events(&mut self, num_events: usize) -> Result<Vec<u64>> {
        self.require_no_fusion()?;
        let masses = self.gather_masses()?;
        let total: f64 = masses.iter().sum();
        let mut events = Vec::with_capacity(num_events);
        for _ in 0..num_events {
            let draw = self.rng.random::<f64>() * total;
            events.push(self.sample_global(&masses, draw)?);
        }
        Ok(events)
    }

    fn gather_masses(&mut self) -> Result<Vec<f64>> {
        let mut local = 0.0;
        for block in self.data.chunks_exact(self.block_size) {
            local += measurement::norm_sqr_total(&self.policy, block);
        }
        Ok(self.transport.all_gather_f64(local)?)
    }

    /// Resolves one draw against the rank-level masses; the owning rank
    /// scans its blocks and the result is broadcast.
    fn sample_global(&mut self, masses: &[f64], draw: f64) -> Result<u64> {
        let mut owner = masses.len() - 1;
        let mut before = 0.0;
        for (rank, &mass) in masses.iter().enumerate() {
            if before + mass > draw {
                owner = rank;
                break;
            }
            before += mass;
        }
        if owner == masses.len() - 1 {
            // The loop may have fallen through on a float edge; `before`
            // must exclude the owner's own mass.
            before = masses[..owner].iter().sum();
        }

        let mut logical = 0u64;
        if owner == self.transport.rank() {
            let mut target = draw - before;
            let mut hit = None;
            for (block, amplitudes) in self.data.chunks_exact(self.block_size).enumerate() {
                match measurement::sample_in_block(amplitudes, target) {
                    Ok(local) => {
                        hit = Some((block as u64, local as u64));
                        break;
                    }
                    Err(consumed) => target -= consumed,
                }
            }
            let (block, local) = hit.unwrap_or((
                self.layout.num_data_blocks() - 1,
                self.block_size as u64 - 1,
            ));
            let physical =
                (self.layout.block_global(owner, block) << self.num_local_qubits) | local;
            logical = self.permutation.unpermute_bits(physical);
        }
        Ok(self.transport.broadcast_u64(owner, logical)?)
    }

    /// Per-qubit spin expectation values (⟨σx⟩, ⟨σy⟩, ⟨σz⟩)/2, in logical
    /// qubit order.
    pub fn expectation_values(&mut self) -> Result<Vec<[f64; 3]>> {
        self.require_no_fusion()?;
        let mut out = Vec::with_capacity(self.total_num_qubits as usize);
        for q in 0..self.total_num_qubits {
            let qubit = Qubit(q);
            self.localize(&[qubit])?;
            let position = self.permutation.to_physical(qubit).index();
            let mut re = 0.0;
            let mut im = 0.0;
            let mut z = 0.0;
            for block in self.data.chunks_exact(self.block_size) {
                let (block_re, block_im, block_z) =
                    measurement::spin_sums(&self.policy, block, position);
                re += block_re;
                im += block_im;
                z += block_z;
            }
            let re: f64 = self.transport.all_gather_f64(re)?.iter().sum();
            let im: f64 = self.transport.all_gather_f64(im)?.iter().sum();
            let z: f64 = self.transport.all_gather_f64(z)?.iter().sum();
            out.push([re, im, z * 0.5]);
        }
        Ok(out)
    }

    /// Re-initializes the state to the modular-exponentiation
    /// superposition Σ_x |x, base^x mod divisor⟩ / √2^{n_e}.
    pub fn shor_box(
        &mut self,
        base: u64,
        divisor: u64,
        num_exponent_qubits: u32,
    ) -> Result<()> {
        self.require_no_fusion()?;
        if divisor < 2 || base % divisor == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "shor_box: invalid base {} / divisor {}",
                base, divisor
            )));
        }
        let result_bits = 64 - (divisor - 1).leading_zeros();
        if num_exponent_qubits == 0
            || num_exponent_qubits + result_bits > self.total_num_qubits
        {
            return Err(Error::InvalidConfiguration(format!(
                "shor_box: {} exponent qubits plus {} result bits exceed {} qubits",
                num_exponent_qubits, result_bits, self.total_num_qubits
            )));
        }

        self.data.fill(Complex64::ZERO);
        let count = 1u64 << num_exponent_qubits;
        let norm = 1.0 / (count as f64).sqrt();
        let mut power = 1 % divisor;
        for x in 0..count {
            let logical = x | (power << num_exponent_qubits);
            let physical = self.permutation.permute_bits(logical);
            if let Some(slot) = self.owned_slot(physical) {
                self.data[slot] = Complex64::new(norm, 0.0);
            }
            power = ((power as u128 * base as u128) % divisor as u128) as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(n: u32) -> Simulator<SingleProcess> {
        SimulatorBuilder::new(n).seed(42).build_local().unwrap()
    }

    #[test]
    fn builder_validates_initial_state() {
        let err = SimulatorBuilder::new(2)
            .initial_integer(4)
            .build_local()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInitialState { .. }));
    }

    #[test]
    fn builder_validates_group_coverage() {
        // 2^(4-2) = 4 global blocks cannot be covered by one rank with one
        // block.
        let err = SimulatorBuilder::new(4)
            .num_local_qubits(2)
            .build_local()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        // ... but one rank with four blocks covers them.
        let sim = SimulatorBuilder::new(4)
            .num_local_qubits(2)
            .num_data_blocks(4)
            .build_local()
            .unwrap();
        assert_eq!(sim.local_amplitudes().len(), 16);
    }

    #[test]
    fn identity_leaves_state_untouched() {
        let mut sim = local(3);
        sim.hadamard(Qubit(0), &[]).unwrap();
        let before = sim.state_vector().unwrap();
        sim.identity(Qubit(0)).unwrap();
        sim.identity_n(&[Qubit(1), Qubit(2)]).unwrap();
        let after = sim.state_vector().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn capacity_error_carries_context() {
        let mut sim = SimulatorBuilder::new(8)
            .max_operated_qubits(2)
            .build_local()
            .unwrap();
        let err = sim
            .pauli_xn(&[Qubit(0), Qubit(1), Qubit(2)], &[])
            .unwrap_err();
        match err {
            Error::TooManyOperatedQubits {
                gate,
                requested,
                limit,
            } => {
                assert_eq!(gate, "pauli_xn");
                assert_eq!(requested, 3);
                assert_eq!(limit, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn duplicate_operands_are_rejected() {
        let mut sim = local(3);
        assert!(sim.swap(Qubit(1), Qubit(1), &[]).is_err());
        assert!(sim
            .pauli_x(Qubit(0), &[Control(Qubit(0))])
            .is_err());
    }

    #[test]
    fn measurement_during_fusion_is_rejected() {
        let mut sim = local(3);
        sim.begin_fusion().unwrap();
        assert!(matches!(sim.measure(), Err(Error::FusionOpen)));
        assert!(matches!(
            sim.projective_measurement(Qubit(0)),
            Err(Error::FusionOpen)
        ));
        sim.end_fusion().unwrap();
    }

    #[test]
    fn deterministic_measurement_of_basis_state() {
        let mut sim = SimulatorBuilder::new(3)
            .initial_integer(0b101)
            .seed(7)
            .build_local()
            .unwrap();
        assert_eq!(sim.measure().unwrap(), 0b101);
        assert_eq!(sim.projective_measurement(Qubit(0)).unwrap(), 1);
        assert_eq!(sim.projective_measurement(Qubit(1)).unwrap(), 0);
    }

    #[test]
    fn shor_box_prepares_modular_superposition() {
        // base 2, divisor 3: powers cycle 1, 2, 1, 2.
        let mut sim = local(4);
        sim.shor_box(2, 3, 2).unwrap();
        let state = sim.state_vector().unwrap();
        for (x, expected_f) in [(0u64, 1u64), (1, 2), (2, 1), (3, 2)] {
            let index = (x | (expected_f << 2)) as usize;
            assert!((state[index].re - 0.5).abs() < 1e-12);
        }
        let mass: f64 = state.iter().map(|a| a.norm_sqr()).sum();
        assert!((mass - 1.0).abs() < 1e-12);
    }
}
