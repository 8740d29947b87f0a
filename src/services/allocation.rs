//! 抽奖分配的纯函数部分: 资格校验、候选过滤、加权抽取、可用性替换。
//! 不涉及存储与随机源, 给定输入结果完全确定。

use std::collections::HashMap;

use crate::error::EligibilityRejection;
use crate::models::{Candidate, DeviceRecord, Outcome, PrizeState, PrizeTable, WheelSlot};

/// 资格校验, 在任何抽取与写入之前执行
pub fn evaluate_eligibility(
    device: Option<&DeviceRecord>,
    prior_spin_count: u32,
    max_spins_per_session: Option<u32>,
) -> Result<(), EligibilityRejection> {
    if device.is_some_and(|d| d.has_spun) {
        return Err(EligibilityRejection::DeviceAlreadySpun);
    }
    if let Some(max) = max_spins_per_session
        && prior_spin_count >= max
    {
        return Err(EligibilityRejection::SpinLimitExceeded);
    }
    Ok(())
}

fn states_by_name(states: &[PrizeState]) -> HashMap<&str, &PrizeState> {
    states.iter().map(|s| (s.name.as_str(), s)).collect()
}

/// 完整静态奖位表 (不考虑库存)
pub fn all_candidates(table: &PrizeTable) -> Vec<Candidate> {
    table
        .slots()
        .iter()
        .map(|slot| Candidate::new(slot.outcome(), slot.weight()))
        .collect()
}

/// 过滤出本次可抽中的奖品, 保持奖位顺序; 未中奖奖位始终保留。
/// 没有状态记录的奖品视为不可用。
pub fn filter_eligible_prizes(table: &PrizeTable, states: &[PrizeState]) -> Vec<Candidate> {
    let by_name = states_by_name(states);
    table
        .slots()
        .iter()
        .filter(|slot| match slot {
            WheelSlot::Prize(p) => by_name
                .get(p.name.as_str())
                .is_some_and(|s| s.is_available()),
            WheelSlot::NoWin(_) => true,
        })
        .map(|slot| Candidate::new(slot.outcome(), slot.weight()))
        .collect()
}

pub fn total_weight(candidates: &[Candidate]) -> f64 {
    candidates.iter().map(|c| c.weight).sum()
}

/// 加权抽取
///
/// `draw` 取值于 `[0, total)`。按固定顺序累加权重, 返回第一个累计权重超过 `draw`
/// 的候选项; 权重为 0 的候选项永远不会被选中。遍历结束仍未命中
/// (浮点误差或总权重为 0) 时返回未中奖。
pub fn draw_weighted_outcome(candidates: &[Candidate], draw: f64) -> Outcome {
    let mut acc = 0.0;
    for c in candidates {
        acc += c.weight;
        if draw < acc {
            return c.outcome.clone();
        }
    }
    Outcome::NoWin
}

/// 抽取后的可用性检查: 奖品无库存或已达当日上限时替换为未中奖
pub fn resolve_availability(outcome: Outcome, states: &[PrizeState]) -> Outcome {
    match &outcome {
        Outcome::NoWin => outcome,
        Outcome::Prize(name) => {
            let available = states
                .iter()
                .find(|s| &s.name == name)
                .is_some_and(PrizeState::is_available);
            if available { outcome } else { Outcome::NoWin }
        }
    }
}
