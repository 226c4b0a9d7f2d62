// Bitcoin Dev Kit
// Written in 2020 by Alekos Filini <alekos.filini@gmail.com>
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Coin selection
//!
//! This module provides [`CoinSelector`], which picks the unspent outputs funding a payment and
//! decides whether the resulting transaction carries a change output.
//!
//! The search is a depth first branch and bound over the outputs sorted by value, largest first,
//! exploring the inclusion branch before the omission branch. Every visited node is priced with
//! the chain's [`TransactionSizeCalculator`]. A selection is accepted when it pays the fee
//! required by the [`FeePolicy`], fits in the chain's maximum transaction size and leaves either
//! no change or a change above the dust threshold. Among the accepted selections the one paying
//! the lowest fee wins. Ties go to the one with fewer inputs, then to the smaller transaction.
//!
//! The exploration is bounded: after [`BNB_TOTAL_TRIES`] steps, or when more than
//! [`BNB_MAX_CANDIDATES`] outputs are offered, the best selection found so far is used, and if
//! there is none the selector falls back to spending the largest outputs first.
//!
//! ## Example
//!
//! ```
//! # use std::str::FromStr;
//! # use bdk_utxo::bitcoin::{Address, OutPoint};
//! # use bdk_utxo::wallet::coin_selection::CoinSelector;
//! # use bdk_utxo::*;
//! let script = Address::from_str("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa")?
//!     .assume_checked()
//!     .script_pubkey();
//! let utxos = vec![UnspentOutput {
//!     outpoint: OutPoint::null(),
//!     amount: 100_000,
//!     script: script.clone(),
//!     confirmation: Confirmation::Confirmed { height: 100 },
//! }];
//!
//! let selector = CoinSelector::new(Chain::Bitcoin.size_calculator());
//! let tx = selector.pre_image(
//!     &utxos,
//!     &script,
//!     &PreImageDestination::new(60_000, script.clone()),
//!     FeePolicy::Calculate(FeeRate::from_sat_per_vb(10)),
//! )?;
//!
//! assert_eq!(tx.estimated_size, 226);
//! assert_eq!(tx.fee, 2_260);
//! assert_eq!(tx.change_amount, 37_740);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use bitcoin::Script;

use log::debug;

use crate::error::Error;
use crate::network::Chain;
use crate::types::{FeePolicy, PreImageDestination, PreImageTransaction, UnspentOutput};
use crate::wallet::size::TransactionSizeCalculator;
use crate::wallet::utils::{IsDust, ScriptType};

/// Maximum number of nodes visited by the branch and bound search
pub const BNB_TOTAL_TRIES: usize = 100_000;
/// Above this many candidates the branch and bound search is skipped
pub const BNB_MAX_CANDIDATES: usize = 1_000;

/// What to do with a change that would fall below the dust threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DustChangePolicy {
    /// Drop the change output and leave the remainder to the miners. Only applies to
    /// [`FeePolicy::Calculate`]: an exact fee is never increased.
    FoldIntoFee,
    /// Refuse the selection
    Reject,
}

impl std::default::Default for DustChangePolicy {
    fn default() -> Self {
        DustChangePolicy::FoldIntoFee
    }
}

/// Builds transaction pre-images for one chain
///
/// The selector holds no state between calls: the same arguments always produce the same
/// pre-image.
#[derive(Debug)]
pub struct CoinSelector {
    calculator: Box<dyn TransactionSizeCalculator>,
    dust_change_policy: DustChangePolicy,
}

impl CoinSelector {
    /// Create a selector pricing transactions with `calculator`
    pub fn new(calculator: Box<dyn TransactionSizeCalculator>) -> Self {
        CoinSelector {
            calculator,
            dust_change_policy: DustChangePolicy::default(),
        }
    }

    /// Create a selector for `chain`
    pub fn for_chain(chain: Chain) -> Self {
        CoinSelector::new(chain.size_calculator())
    }

    /// Change how dust change is handled
    pub fn dust_change_policy(mut self, policy: DustChangePolicy) -> Self {
        self.dust_change_policy = policy;
        self
    }

    /// The calculator used to price transactions
    pub fn calculator(&self) -> &dyn TransactionSizeCalculator {
        self.calculator.as_ref()
    }

    /// Select the outputs paying `destination` and build the pre-image
    ///
    /// `change_script` receives the change, if the selection leaves any above the dust threshold.
    pub fn pre_image(
        &self,
        outputs: &[UnspentOutput],
        change_script: &Script,
        destination: &PreImageDestination,
        fee_policy: FeePolicy,
    ) -> Result<PreImageTransaction, Error> {
        if destination.amount == 0 {
            return Err(Error::WrongAmount);
        }
        if outputs.is_empty() {
            return Err(Error::NoOutputs);
        }

        let calculator = self.calculator.as_ref();
        let destination_type = ScriptType::from_script(&destination.script);
        let destination_dust = calculator.dust_threshold(destination_type)?;
        if destination.amount.is_dust(destination_dust) {
            return Err(Error::DustAmount {
                amount: destination.amount,
                threshold: destination_dust,
            });
        }

        let available = outputs
            .iter()
            .try_fold(0u64, |sum, o| sum.checked_add(o.amount))
            .ok_or(Error::Overflow)?;
        if available < destination.amount {
            return Err(Error::InsufficientFunds {
                needed: destination.amount,
                available,
            });
        }

        let ctx = self.context(change_script, destination, destination_type, fee_policy)?;
        let candidates = sorted_candidates(outputs);

        // fail early on inputs the chain can't spend
        for candidate in &candidates {
            calculator.transaction_size(&[candidate.script_type], &[destination_type])?;
        }

        let mut flags = SearchFlags::default();
        let selection = if candidates.len() > BNB_MAX_CANDIDATES {
            debug!(
                "{} candidates, skipping branch and bound",
                candidates.len()
            );
            ctx.largest_first(&candidates, &mut flags)?
        } else {
            match ctx.branch_and_bound(&candidates, &mut flags)? {
                BnbResult::Found(selection) => Some(selection),
                BnbResult::Exhausted => None,
                BnbResult::TotalTriesExceeded => {
                    debug!("BnB tries exceeded, falling back to largest first");
                    ctx.largest_first(&candidates, &mut flags)?
                }
            }
        };

        match selection {
            Some(selection) => Ok(ctx.build(&candidates, selection)),
            None => Err(ctx.failure(&candidates, available, &flags)?),
        }
    }

    fn context<'a>(
        &'a self,
        change_script: &'a Script,
        destination: &'a PreImageDestination,
        destination_type: ScriptType,
        fee_policy: FeePolicy,
    ) -> Result<Context<'a>, Error> {
        let calculator = self.calculator.as_ref();
        let change_type = ScriptType::from_script(change_script);

        Ok(Context {
            calculator,
            destination,
            destination_type,
            change_script,
            change_type,
            change_dust: calculator.dust_threshold(change_type)?,
            fee_policy,
            fold_dust: self.dust_change_policy == DustChangePolicy::FoldIntoFee
                && matches!(fee_policy, FeePolicy::Calculate(_)),
            max_size: calculator.network().max_transaction_size,
        })
    }
}

/// Candidates sorted by descending amount. The sort is stable, so equal amounts keep the
/// caller's order.
fn sorted_candidates(outputs: &[UnspentOutput]) -> Vec<Candidate<'_>> {
    let mut candidates = outputs
        .iter()
        .map(|output| Candidate {
            output,
            script_type: output.script_type(),
        })
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| b.output.amount.cmp(&a.output.amount));
    candidates
}

struct Candidate<'a> {
    output: &'a UnspentOutput,
    script_type: ScriptType,
}

/// Why covering selections were turned down
#[derive(Debug, Default)]
struct SearchFlags {
    dust_change: Option<u64>,
    oversized: bool,
}

/// Shape of the transaction built on top of a selection
#[derive(Debug, Clone, Copy)]
struct Variant {
    change: u64,
    fee: u64,
    size: u64,
}

#[derive(Debug, Clone)]
struct Selection {
    // selected[i] is true if candidates[i] is spent, may be shorter than the candidates
    selected: Vec<bool>,
    input_count: usize,
    variant: Variant,
}

impl Selection {
    fn key(&self) -> (u64, usize, u64) {
        (self.variant.fee, self.input_count, self.variant.size)
    }

    fn is_better_than(&self, other: &Selection) -> bool {
        self.key() < other.key()
    }

    /// Whether nothing below a node paying at least `min_fee` for `min_size`, with
    /// `input_count` inputs, can beat this selection
    fn bounds(&self, min_fee: u64, min_size: u64, input_count: usize) -> bool {
        let (fee, count, size) = self.key();
        min_fee > fee
            || (min_fee == fee
                && (input_count > count || (input_count == count && min_size >= size)))
    }
}

enum BnbResult {
    Found(Selection),
    Exhausted,
    TotalTriesExceeded,
}

struct Context<'a> {
    calculator: &'a dyn TransactionSizeCalculator,
    destination: &'a PreImageDestination,
    destination_type: ScriptType,
    change_script: &'a Script,
    change_type: ScriptType,
    change_dust: u64,
    fee_policy: FeePolicy,
    fold_dust: bool,
    max_size: u64,
}

impl<'a> Context<'a> {
    fn fee_for_size(&self, size: u64) -> Result<u64, Error> {
        self.fee_policy.fee_for_size(size).ok_or(Error::Overflow)
    }

    /// Size and fee of the smallest transaction spending `inputs`
    fn min_cost(&self, inputs: &[ScriptType]) -> Result<(u64, u64), Error> {
        let size = self
            .calculator
            .transaction_size(inputs, &[self.destination_type])?;
        Ok((size, self.fee_for_size(size)?))
    }

    /// Best transaction spending exactly `inputs`, worth `value` in total
    fn variant(
        &self,
        inputs: &[ScriptType],
        value: u64,
        flags: &mut SearchFlags,
    ) -> Result<Option<Variant>, Error> {
        let excess = match value.checked_sub(self.destination.amount) {
            Some(excess) => excess,
            None => return Ok(None),
        };

        let (single_size, single_fee) = self.min_cost(inputs)?;
        let remainder = match excess.checked_sub(single_fee) {
            Some(remainder) => remainder,
            None => return Ok(None),
        };
        if single_size > self.max_size {
            flags.oversized = true;
            return Ok(None);
        }
        if remainder == 0 {
            return Ok(Some(Variant {
                change: 0,
                fee: single_fee,
                size: single_size,
            }));
        }

        let change_size = self
            .calculator
            .transaction_size(inputs, &[self.destination_type, self.change_type])?;
        let change_fee = self.fee_for_size(change_size)?;
        let change = excess.saturating_sub(change_fee);

        if change > 0 && !change.is_dust(self.change_dust) {
            if change_size > self.max_size {
                flags.oversized = true;
                return Ok(None);
            }
            return Ok(Some(Variant {
                change,
                fee: change_fee,
                size: change_size,
            }));
        }

        if self.fold_dust {
            return Ok(Some(Variant {
                change: 0,
                fee: single_fee + remainder,
                size: single_size,
            }));
        }

        flags.dust_change = Some(remainder);
        Ok(None)
    }

    fn branch_and_bound(
        &self,
        candidates: &[Candidate],
        flags: &mut SearchFlags,
    ) -> Result<BnbResult, Error> {
        // current_selection[i] will contain true if we are using candidates[i], false otherwise.
        // Note that current_selection.len() could be less than candidates.len(), it just means
        // that we still haven't decided if we should keep certain candidates or not.
        let mut current_selection: Vec<bool> = Vec::with_capacity(candidates.len());
        let mut selected_types: Vec<ScriptType> = Vec::with_capacity(candidates.len());
        let mut curr_value: u64 = 0;
        let mut curr_available_value: u64 = candidates.iter().map(|c| c.output.amount).sum();

        let mut best: Option<Selection> = None;

        for _ in 0..BNB_TOTAL_TRIES {
            let mut backtrack = false;

            let (min_size, min_fee) = self.min_cost(&selected_types)?;
            let needed = self.destination.amount.saturating_add(min_fee);

            if curr_value + curr_available_value < needed
                || best
                    .as_ref()
                    .map_or(false, |b| b.bounds(min_fee, min_size, selected_types.len()))
            {
                // Cannot reach the target with what's left, or can't beat the best selection.
                // Go back and try other branch
                backtrack = true;
            } else if min_size > self.max_size {
                // Adding inputs only makes it bigger
                flags.oversized = true;
                backtrack = true;
            } else if curr_value >= needed {
                // Keep going forward: a folded dust change can cost more than an extra input.
                // Children that can't do better are cut by the bound on the next step.
                if let Some(variant) = self.variant(&selected_types, curr_value, flags)? {
                    let selection = Selection {
                        selected: current_selection.clone(),
                        input_count: selected_types.len(),
                        variant,
                    };
                    if best.as_ref().map_or(true, |b| selection.is_better_than(b)) {
                        best = Some(selection);
                    }
                }
            }

            if !backtrack && current_selection.len() == candidates.len() {
                backtrack = true;
            }

            if backtrack {
                // Walk backwards to find the last included candidate that still needs to have
                // its omission branch traversed.
                while let Some(false) = current_selection.last() {
                    current_selection.pop();
                    curr_available_value += candidates[current_selection.len()].output.amount;
                }

                if current_selection.last_mut().is_none() {
                    // We have walked back to the first candidate and no branch is untraversed.
                    // All solutions searched
                    return Ok(match best {
                        Some(best) => BnbResult::Found(best),
                        None => BnbResult::Exhausted,
                    });
                }

                if let Some(c) = current_selection.last_mut() {
                    // Included on previous iterations, try excluding now.
                    *c = false;
                }

                let candidate = &candidates[current_selection.len() - 1];
                curr_value -= candidate.output.amount;
                selected_types.pop();
            } else {
                // Moving forwards, continuing down this branch
                let candidate = &candidates[current_selection.len()];

                curr_available_value -= candidate.output.amount;

                // Inclusion branch first (Largest First Exploration)
                current_selection.push(true);
                curr_value += candidate.output.amount;
                selected_types.push(candidate.script_type);
            }
        }

        Ok(match best {
            Some(best) => BnbResult::Found(best),
            None => BnbResult::TotalTriesExceeded,
        })
    }

    fn largest_first(
        &self,
        candidates: &[Candidate],
        flags: &mut SearchFlags,
    ) -> Result<Option<Selection>, Error> {
        let mut selected_types = Vec::new();
        let mut value: u64 = 0;

        for (index, candidate) in candidates.iter().enumerate() {
            selected_types.push(candidate.script_type);
            value += candidate.output.amount;

            if let Some(variant) = self.variant(&selected_types, value, flags)? {
                return Ok(Some(Selection {
                    selected: vec![true; index + 1],
                    input_count: index + 1,
                    variant,
                }));
            }
        }

        Ok(None)
    }

    fn build(&self, candidates: &[Candidate], selection: Selection) -> PreImageTransaction {
        let selected_outputs = candidates
            .iter()
            .zip(selection.selected)
            .filter_map(|(candidate, is_selected)| {
                if is_selected {
                    Some(candidate.output.clone())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "Selected {} outputs, change {}, fee {}, size {}",
            selected_outputs.len(),
            selection.variant.change,
            selection.variant.fee,
            selection.variant.size
        );

        PreImageTransaction {
            selected_outputs,
            destination_amount: self.destination.amount,
            destination_script: self.destination.script.clone(),
            change_amount: selection.variant.change,
            change_script: self.change_script.to_owned(),
            fee: selection.variant.fee,
            estimated_size: selection.variant.size,
        }
    }

    fn failure(
        &self,
        candidates: &[Candidate],
        available: u64,
        flags: &SearchFlags,
    ) -> Result<Error, Error> {
        if let Some(amount) = flags.dust_change {
            return Ok(Error::DustAmount {
                amount,
                threshold: self.change_dust,
            });
        }

        let all_types = candidates.iter().map(|c| c.script_type).collect::<Vec<_>>();
        let (_, min_fee) = self.min_cost(&all_types)?;
        let needed = self
            .destination
            .amount
            .checked_add(min_fee)
            .ok_or(Error::Overflow)?;
        if available < needed {
            return Ok(Error::InsufficientFunds { needed, available });
        }

        debug!(
            "No suitable selection found, oversized: {}",
            flags.oversized
        );
        Ok(Error::UnableToFindSuitableUtxos)
    }
}
