use crate::Error;
use mweb_cryptography::{
    add_commitments, commit_transparent, BlindingFactor, Blinds, Commitment, CommitmentAlgebra,
};
use tracing::debug;

/// Verify that a block (or transaction) conserves value.
///
/// Balance holds when `sum(outputs) + fee*G == sum(inputs) + sum(kernel_excesses) + offset*H`.
/// A non-identity residual is returned as [Error::Unbalanced].
pub fn verify_balance<A: CommitmentAlgebra>(
    algebra: &A,
    inputs: &[Commitment],
    outputs: &[Commitment],
    kernel_excesses: &[Commitment],
    offset: &BlindingFactor,
    fee: u64,
) -> Result<(), Error> {
    let mut positive = Vec::with_capacity(outputs.len() + 1);
    positive.extend_from_slice(outputs);
    positive.push(commit_transparent(algebra, fee)?);

    let mut negative = Vec::with_capacity(inputs.len() + kernel_excesses.len() + 1);
    negative.extend_from_slice(inputs);
    negative.extend_from_slice(kernel_excesses);
    if !offset.is_zero() {
        negative.push(algebra.commit(0, offset)?);
    }

    let residual = add_commitments(algebra, &positive, &negative)?;
    if !residual.is_zero() {
        debug!(%residual, "block does not balance");
        return Err(Error::Unbalanced(residual));
    }
    Ok(())
}

/// Split `offset` off of a kernel blinding factor, returning `blind - offset`.
pub fn split_offset<A: CommitmentAlgebra>(
    algebra: &A,
    blind: BlindingFactor,
    offset: BlindingFactor,
) -> Result<BlindingFactor, Error> {
    Ok(Blinds::new().add(blind).sub(offset).total(algebra)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mweb_cryptography::{add_blinding_factors, Secp256r1};
    use rand::{rngs::StdRng, SeedableRng};
    use test_case::test_case;

    struct Block {
        inputs: Vec<Commitment>,
        outputs: Vec<Commitment>,
        excesses: Vec<Commitment>,
        offset: BlindingFactor,
        fee: u64,
    }

    /// Build a balanced block spending `input` into `output` and paying the difference as a fee.
    fn block(algebra: &Secp256r1, seed: u64, input: u64, output: u64, offset: bool) -> Block {
        let mut rng = StdRng::seed_from_u64(seed);
        let input_blind = BlindingFactor::random(&mut rng);
        let output_blind = BlindingFactor::random(&mut rng);
        let offset = if offset {
            BlindingFactor::random(&mut rng)
        } else {
            BlindingFactor::zero()
        };

        let excess_blind =
            add_blinding_factors(algebra, &[output_blind], &[input_blind]).unwrap();
        let kernel_blind = split_offset(algebra, excess_blind, offset).unwrap();
        Block {
            inputs: vec![algebra.commit(input, &input_blind).unwrap()],
            outputs: vec![algebra.commit(output, &output_blind).unwrap()],
            excesses: vec![algebra.commit(0, &kernel_blind).unwrap()],
            offset,
            fee: input - output,
        }
    }

    fn verify(algebra: &Secp256r1, block: &Block) -> Result<(), Error> {
        verify_balance(
            algebra,
            &block.inputs,
            &block.outputs,
            &block.excesses,
            &block.offset,
            block.fee,
        )
    }

    #[test_case(1, 1_000, 1_000, true; "offset")]
    #[test_case(2, 1_000, 1_000, false; "no offset")]
    #[test_case(3, 1_000, 900, true; "fee")]
    #[test_case(4, 5, 0, false; "all fee")]
    fn test_balanced(seed: u64, input: u64, output: u64, offset: bool) {
        let algebra = Secp256r1::new().unwrap();
        let block = block(&algebra, seed, input, output, offset);
        verify(&algebra, &block).unwrap();
    }

    #[test]
    fn test_perturbed_amount() {
        let algebra = Secp256r1::new().unwrap();
        let mut block = block(&algebra, 5, 1_000, 1_000, true);
        let extra = commit_transparent(&algebra, 1).unwrap();
        block.outputs.push(extra);
        let Err(Error::Unbalanced(residual)) = verify(&algebra, &block) else {
            panic!("expected unbalanced block");
        };
        assert_eq!(residual, extra);
    }

    #[test]
    fn test_wrong_fee() {
        let algebra = Secp256r1::new().unwrap();
        let mut block = block(&algebra, 6, 1_000, 900, false);
        block.fee = 99;
        assert!(matches!(verify(&algebra, &block), Err(Error::Unbalanced(_))));
    }

    #[test]
    fn test_wrong_offset() {
        let algebra = Secp256r1::new().unwrap();
        let mut block = block(&algebra, 7, 1_000, 1_000, true);
        block.offset = BlindingFactor::zero();
        assert!(matches!(verify(&algebra, &block), Err(Error::Unbalanced(_))));
    }

    #[test]
    fn test_empty_block_balances() {
        let algebra = Secp256r1::new().unwrap();
        verify_balance(&algebra, &[], &[], &[], &BlindingFactor::zero(), 0).unwrap();
    }

    #[test]
    fn test_invalid_commitment() {
        let algebra = Secp256r1::new().unwrap();
        let invalid = Commitment::from([0xFF; 33]);
        let result = verify_balance(&algebra, &[invalid], &[], &[], &BlindingFactor::zero(), 0);
        assert!(matches!(result, Err(Error::Crypto(_))));
    }

    #[test]
    fn test_split_offset() {
        let algebra = Secp256r1::new().unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let blind = BlindingFactor::random(&mut rng);
        let offset = BlindingFactor::random(&mut rng);
        let kernel = split_offset(&algebra, blind, offset).unwrap();
        assert_eq!(
            add_blinding_factors(&algebra, &[kernel, offset], &[]).unwrap(),
            blind
        );
        assert_eq!(
            split_offset(&algebra, blind, BlindingFactor::zero()).unwrap(),
            blind
        );
    }
}
