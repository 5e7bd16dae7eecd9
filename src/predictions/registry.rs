//! Prediction registry
//!
//! Accepts claims from assessments, keeps at most one open prediction per
//! `(deal, type)` by superseding, and serves the open list that is fed
//! back to the reasoner.

use super::types::{NewPrediction, Prediction, PredictionKind, PredictionUpdate};
use super::PredictionError;
use crate::config::RegistryConfig;
use crate::context::Milestone;
use crate::store::Store;
use chrono::NaiveDate;
use std::sync::Arc;

/// Front door for prediction writes
pub struct PredictionRegistry {
    config: RegistryConfig,
    store: Arc<dyn Store>,
}

impl PredictionRegistry {
    pub fn new(config: RegistryConfig, store: Arc<dyn Store>) -> Self {
        Self { config, store }
    }

    /// Reject claims that could never be resolved or scored. `milestones` is
    /// the deal's milestone list as observed today.
    pub fn validate(
        prediction: &NewPrediction,
        milestones: &[Milestone],
        today: NaiveDate,
    ) -> Result<(), PredictionError> {
        let invalid = |reason: &str| PredictionError::Invalid {
            deal: prediction.deal.clone(),
            reason: reason.to_string(),
        };

        if prediction.deal.trim().is_empty() {
            return Err(invalid("empty deal"));
        }
        if prediction.claim.trim().is_empty() {
            return Err(invalid("empty claim"));
        }
        if !prediction.probability.is_finite() || !(0.0..=1.0).contains(&prediction.probability) {
            return Err(invalid("probability outside [0, 1]"));
        }
        if prediction.evidence.iter().all(|e| e.trim().is_empty()) {
            return Err(invalid("no evidence"));
        }
        if let Some(deadline) = prediction.deadline {
            if deadline < today {
                return Err(invalid("deadline in the past"));
            }
        }

        match &prediction.kind {
            PredictionKind::MilestoneCompletion { milestone_id } => {
                if milestone_id.trim().is_empty() {
                    return Err(invalid("milestone prediction without milestone id"));
                }
                match milestones.iter().find(|m| m.id == *milestone_id) {
                    None => Err(invalid("unknown milestone id")),
                    // Outcome is already known
                    Some(m) if m.status.is_terminal() => Err(invalid("milestone already settled")),
                    Some(_) => Ok(()),
                }
            }
            PredictionKind::NextEvent { event } if event.trim().is_empty() => {
                Err(invalid("next event prediction without event"))
            }
            PredictionKind::SpreadDirection { .. } if prediction.deadline.is_none() => {
                Err(invalid("spread prediction without deadline"))
            }
            PredictionKind::BreakPrice { price: Some(price) } if price.is_sign_negative() => {
                Err(invalid("negative break price"))
            }
            _ => Ok(()),
        }
    }

    /// Validate, then supersede the open prediction of the same type and
    /// insert this one as open
    pub async fn submit(
        &self,
        prediction: NewPrediction,
        milestones: &[Milestone],
        today: NaiveDate,
    ) -> Result<Prediction, PredictionError> {
        Self::validate(&prediction, milestones, today)?;

        let prediction = prediction.into_open(today);
        let superseded = self.store.supersede_and_insert(prediction.clone()).await?;

        tracing::debug!(
            deal = %prediction.deal,
            prediction_type = %prediction.prediction_type(),
            id = %prediction.id,
            superseded = ?superseded,
            "Prediction registered"
        );
        metrics::counter!(
            "dealassess_predictions_submitted_total",
            "type" => prediction.prediction_type().as_str()
        )
        .increment(1);

        Ok(prediction)
    }

    /// Open predictions for a deal, newest first, capped
    pub async fn list_open(&self, deal: &str) -> Result<Vec<Prediction>, PredictionError> {
        let mut open = self.store.open_predictions(Some(deal)).await?;
        open.truncate(self.config.open_list_cap);
        Ok(open)
    }

    /// Revise the open prediction of `update.prediction_type` by
    /// resubmitting it with the new probability
    pub async fn apply_update(
        &self,
        deal: &str,
        assessment_id: Option<uuid::Uuid>,
        update: PredictionUpdate,
        milestones: &[Milestone],
        today: NaiveDate,
    ) -> Result<Prediction, PredictionError> {
        let current = self
            .store
            .open_predictions(Some(deal))
            .await?
            .into_iter()
            .find(|p| p.prediction_type() == update.prediction_type)
            .ok_or_else(|| PredictionError::NoOpenPrediction {
                deal: deal.to_string(),
                prediction_type: update.prediction_type,
            })?;

        let mut evidence = if update.evidence.is_empty() {
            current.evidence.clone()
        } else {
            update.evidence.clone()
        };
        if !update.reason.trim().is_empty() {
            evidence.push(format!("revision: {}", update.reason.trim()));
        }

        let revised = NewPrediction {
            deal: current.deal.clone(),
            assessment_id: assessment_id.or(current.assessment_id),
            kind: current.kind.clone(),
            claim: current.claim.clone(),
            deadline: update.deadline.or(current.deadline),
            probability: update.probability,
            confidence: current.confidence,
            evidence,
        };

        tracing::debug!(
            deal = %deal,
            prediction_type = %update.prediction_type,
            from = current.probability,
            to = update.probability,
            "Revising prediction"
        );
        self.submit(revised, milestones, today).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MilestoneStatus;
    use crate::predictions::{Confidence, PredictionStatus, PredictionType, SpreadDirection};
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn milestone(id: &str, status: MilestoneStatus) -> Milestone {
        Milestone {
            id: id.to_string(),
            kind: "regulatory_clearance".to_string(),
            status,
            expected_date: None,
            actual_date: None,
        }
    }

    fn registry() -> PredictionRegistry {
        PredictionRegistry::new(RegistryConfig::default(), Arc::new(MemoryStore::new()))
    }

    fn new_prediction(kind: PredictionKind) -> NewPrediction {
        NewPrediction {
            deal: "ACME".to_string(),
            assessment_id: None,
            kind,
            claim: "HSR clears by the end of March".to_string(),
            deadline: Some(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()),
            probability: 0.9,
            confidence: Confidence::High,
            evidence: vec!["Early termination granted to peers".to_string()],
        }
    }

    #[test]
    fn test_validate_rules() {
        let ok = new_prediction(PredictionKind::DealCloses);
        assert!(PredictionRegistry::validate(&ok, &[], today()).is_ok());

        let mut p = ok.clone();
        p.claim = "  ".to_string();
        assert!(PredictionRegistry::validate(&p, &[], today()).is_err());

        let mut p = ok.clone();
        p.probability = 1.2;
        assert!(PredictionRegistry::validate(&p, &[], today()).is_err());

        let mut p = ok.clone();
        p.probability = f64::NAN;
        assert!(PredictionRegistry::validate(&p, &[], today()).is_err());

        let mut p = ok.clone();
        p.evidence.clear();
        assert!(PredictionRegistry::validate(&p, &[], today()).is_err());

        let mut p = ok.clone();
        p.deadline = today().pred_opt();
        assert!(PredictionRegistry::validate(&p, &[], today()).is_err());

        let p = new_prediction(PredictionKind::MilestoneCompletion {
            milestone_id: String::new(),
        });
        assert!(PredictionRegistry::validate(&p, &[], today()).is_err());

        let mut p = new_prediction(PredictionKind::SpreadDirection {
            direction: SpreadDirection::Tighter,
            spread_at_submission_bps: Some(dec!(250)),
        });
        p.deadline = None;
        assert!(PredictionRegistry::validate(&p, &[], today()).is_err());
    }

    #[test]
    fn test_milestone_prediction_needs_open_milestone() {
        let p = new_prediction(PredictionKind::MilestoneCompletion {
            milestone_id: "hsr".to_string(),
        });

        let pending = [milestone("hsr", MilestoneStatus::Pending)];
        assert!(PredictionRegistry::validate(&p, &pending, today()).is_ok());

        let other = [milestone("cfius", MilestoneStatus::Pending)];
        assert!(PredictionRegistry::validate(&p, &other, today()).is_err());
        assert!(PredictionRegistry::validate(&p, &[], today()).is_err());

        for status in [
            MilestoneStatus::Completed,
            MilestoneStatus::Failed,
            MilestoneStatus::Waived,
        ] {
            let settled = [milestone("hsr", status)];
            assert!(matches!(
                PredictionRegistry::validate(&p, &settled, today()),
                Err(PredictionError::Invalid { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_settled_milestone_keeps_existing_prediction_open() {
        let registry = registry();
        let kind = PredictionKind::MilestoneCompletion {
            milestone_id: "hsr".to_string(),
        };
        let first = registry
            .submit(
                new_prediction(kind.clone()),
                &[milestone("hsr", MilestoneStatus::InProgress)],
                today(),
            )
            .await
            .unwrap();

        let late = registry
            .submit(
                new_prediction(kind),
                &[milestone("hsr", MilestoneStatus::Completed)],
                today(),
            )
            .await;
        assert!(late.is_err());

        let open = registry.list_open("ACME").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, first.id);
    }

    #[test]
    fn test_deadline_today_is_allowed() {
        let mut p = new_prediction(PredictionKind::DealCloses);
        p.deadline = Some(today());
        assert!(PredictionRegistry::validate(&p, &[], today()).is_ok());
    }

    #[tokio::test]
    async fn test_second_submission_supersedes_first() {
        let registry = registry();
        let first = registry
            .submit(new_prediction(PredictionKind::DealCloses), &[], today())
            .await
            .unwrap();
        let second = registry
            .submit(new_prediction(PredictionKind::DealCloses), &[], today())
            .await
            .unwrap();

        let open = registry.list_open("ACME").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, second.id);

        let first = registry.store.prediction(first.id).await.unwrap().unwrap();
        assert_eq!(first.status, PredictionStatus::Superseded);
        assert_eq!(first.superseded_by, Some(second.id));
    }

    #[tokio::test]
    async fn test_invalid_submission_is_not_stored() {
        let registry = registry();
        let mut p = new_prediction(PredictionKind::DealCloses);
        p.probability = -0.1;
        let result = registry.submit(p, &[], today()).await;
        assert!(matches!(result, Err(PredictionError::Invalid { .. })));
        assert!(registry.list_open("ACME").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_open_is_capped() {
        let registry = PredictionRegistry::new(
            RegistryConfig { open_list_cap: 2 },
            Arc::new(MemoryStore::new()),
        );
        for kind in [
            PredictionKind::DealCloses,
            PredictionKind::BreakPrice { price: None },
            PredictionKind::NextEvent {
                event: "second request".to_string(),
            },
        ] {
            registry.submit(new_prediction(kind), &[], today()).await.unwrap();
        }
        assert_eq!(registry.list_open("ACME").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_update_resubmits() {
        let registry = registry();
        let original = registry
            .submit(new_prediction(PredictionKind::DealCloses), &[], today())
            .await
            .unwrap();

        let revised = registry
            .apply_update(
                "ACME",
                None,
                PredictionUpdate {
                    prediction_type: PredictionType::DealCloses,
                    probability: 0.7,
                    deadline: None,
                    evidence: vec![],
                    reason: "Second request issued".to_string(),
                },
                &[],
                today(),
            )
            .await
            .unwrap();

        assert_ne!(revised.id, original.id);
        assert_eq!(revised.probability, 0.7);
        assert_eq!(revised.claim, original.claim);
        assert_eq!(revised.deadline, original.deadline);
        assert!(revised.evidence.iter().any(|e| e.contains("Second request")));

        let open = registry.list_open("ACME").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, revised.id);
    }

    #[tokio::test]
    async fn test_apply_update_without_open_prediction() {
        let registry = registry();
        let result = registry
            .apply_update(
                "ACME",
                None,
                PredictionUpdate {
                    prediction_type: PredictionType::BreakPrice,
                    probability: 0.3,
                    deadline: None,
                    evidence: vec![],
                    reason: "n/a".to_string(),
                },
                &[],
                today(),
            )
            .await;
        assert!(matches!(
            result,
            Err(PredictionError::NoOpenPrediction { .. })
        ));
    }
}
