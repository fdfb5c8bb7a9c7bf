use crate::error::TriageError;
use crate::models::{ClassificationResult, UrgencyTier};

const URGENT_ESCALATION_CONFIDENCE: f64 = 0.3;
const HIGH_ESCALATION_CONFIDENCE: f64 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub tier: UrgencyTier,
    pub primary: ClassificationResult,
    pub guidance: &'static str,
    pub color: &'static str,
    pub severity_weight: u8,
}

impl UrgencyTier {
    pub fn guidance(&self) -> &'static str {
        match self {
            UrgencyTier::Urgent => {
                "Findings suggest a possible malignancy. Schedule a specialist examination and biopsy as soon as possible."
            }
            UrgencyTier::High => {
                "Findings suggest a possible non-melanoma skin cancer or precancerous lesion. Book a dermatology visit within two weeks."
            }
            UrgencyTier::Normal => {
                "Atypical features were detected. Arrange a routine dermatology check and monitor the lesion for changes."
            }
            UrgencyTier::Low => {
                "No concerning features were detected. Continue regular self-examination and report any changes."
            }
        }
    }

    pub fn color_hex(&self) -> &'static str {
        match self {
            UrgencyTier::Urgent => "#D32F2F",
            UrgencyTier::High => "#F57C00",
            UrgencyTier::Normal => "#FBC02D",
            UrgencyTier::Low => "#388E3C",
        }
    }

    pub fn severity_weight(&self) -> u8 {
        match self {
            UrgencyTier::Low => 1,
            UrgencyTier::Normal => 2,
            UrgencyTier::High => 3,
            UrgencyTier::Urgent => 4,
        }
    }

    pub fn requires_notification(&self) -> bool {
        matches!(self, UrgencyTier::High | UrgencyTier::Urgent)
    }
}

/// Maps a single classifier label to a tier. First matching rule wins.
///
/// Classifier labels are English. Case folding is per character: ASCII
/// letters plus the Turkish `İ`/`ı`, which map to a plain `i`.
pub fn tier_for_label(label: &str) -> UrgencyTier {
    let label = fold_label(label);
    let contains_any = |needles: &[&str]| needles.iter().any(|n| label.contains(n));

    if contains_any(&["melanoma", "malignant"]) {
        UrgencyTier::Urgent
    } else if contains_any(&["basal", "squamous", "precancer"]) {
        UrgencyTier::High
    } else if contains_any(&["atypical", "dysplastic"]) {
        UrgencyTier::Normal
    } else {
        UrgencyTier::Low
    }
}

fn fold_label(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            'İ' | 'ı' => 'i',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

pub fn assess(results: &[ClassificationResult]) -> Result<Assessment, TriageError> {
    if results.is_empty() {
        return Err(TriageError::InvalidInput(
            "no classification results supplied".to_string(),
        ));
    }
    if let Some(bad) = results
        .iter()
        .find(|r| !(0.0..=1.0).contains(&r.confidence))
    {
        return Err(TriageError::InvalidInput(format!(
            "confidence {} for `{}` is outside [0, 1]",
            bad.confidence, bad.label
        )));
    }

    // Strict comparison keeps the first of equally confident results.
    let mut primary_index = 0;
    for (index, result) in results.iter().enumerate().skip(1) {
        if result.confidence > results[primary_index].confidence {
            primary_index = index;
        }
    }

    let mut tier = tier_for_label(&results[primary_index].label);

    for (index, alternative) in results.iter().enumerate() {
        if index == primary_index {
            continue;
        }
        match tier_for_label(&alternative.label) {
            UrgencyTier::Urgent if alternative.confidence > URGENT_ESCALATION_CONFIDENCE => {
                tier = UrgencyTier::Urgent;
            }
            UrgencyTier::High
                if alternative.confidence > HIGH_ESCALATION_CONFIDENCE && tier < UrgencyTier::High =>
            {
                tier = UrgencyTier::High;
            }
            _ => {}
        }
    }

    tracing::debug!(
        tier = %tier,
        primary = %results[primary_index].label,
        confidence = results[primary_index].confidence,
        "classification assessed"
    );

    Ok(Assessment {
        tier,
        primary: results[primary_index].clone(),
        guidance: tier.guidance(),
        color: tier.color_hex(),
        severity_weight: tier.severity_weight(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: &str, confidence: f64) -> ClassificationResult {
        ClassificationResult::new(label, confidence)
    }

    #[test]
    fn label_rules_follow_precedence() {
        assert_eq!(tier_for_label("Malignant Melanoma"), UrgencyTier::Urgent);
        assert_eq!(tier_for_label("malignant basal lesion"), UrgencyTier::Urgent);
        assert_eq!(tier_for_label("Squamous cell carcinoma"), UrgencyTier::High);
        assert_eq!(tier_for_label("actinic keratosis (precancerous)"), UrgencyTier::High);
        assert_eq!(tier_for_label("Dysplastic nevus"), UrgencyTier::Normal);
        assert_eq!(tier_for_label("atypical basal pattern"), UrgencyTier::High);
        assert_eq!(tier_for_label("seborrheic keratosis"), UrgencyTier::Low);
        assert_eq!(tier_for_label(""), UrgencyTier::Low);
    }

    #[test]
    fn turkish_cased_labels_still_match() {
        assert_eq!(tier_for_label("MALİGNANT lesion"), UrgencyTier::Urgent);
        assert_eq!(tier_for_label("SQUAMÖUS"), UrgencyTier::Low);
        assert_eq!(tier_for_label("atypıcal nevus"), UrgencyTier::Normal);
    }

    #[test]
    fn melanoma_primary_is_urgent_at_any_confidence() {
        for confidence in [0.0, 0.01, 0.5, 1.0] {
            let assessment = assess(&[result("MELANOMA", confidence)]).unwrap();
            assert_eq!(assessment.tier, UrgencyTier::Urgent);
        }
    }

    #[test]
    fn primary_is_highest_confidence_first_seen_on_tie() {
        let assessment = assess(&[
            result("nevus", 0.2),
            result("dysplastic nevus", 0.6),
            result("seborrheic keratosis", 0.6),
        ])
        .unwrap();
        assert_eq!(assessment.primary.label, "dysplastic nevus");
        assert_eq!(assessment.tier, UrgencyTier::Normal);
    }

    #[test]
    fn urgent_alternative_escalates_low_primary() {
        let assessment = assess(&[result("nevus", 0.9), result("melanoma", 0.35)]).unwrap();
        assert_eq!(assessment.tier, UrgencyTier::Urgent);
        assert_eq!(assessment.primary.label, "nevus");
    }

    #[test]
    fn high_alternative_below_threshold_does_not_escalate() {
        let assessment =
            assess(&[result("nevus", 0.9), result("basal cell carcinoma", 0.35)]).unwrap();
        assert_eq!(assessment.tier, UrgencyTier::Low);
    }

    #[test]
    fn thresholds_are_strict() {
        let at_urgent = assess(&[result("nevus", 0.9), result("melanoma", 0.3)]).unwrap();
        assert_eq!(at_urgent.tier, UrgencyTier::Low);

        let at_high = assess(&[result("nevus", 0.9), result("squamous", 0.4)]).unwrap();
        assert_eq!(at_high.tier, UrgencyTier::Low);

        let above_high = assess(&[result("nevus", 0.5), result("squamous", 0.41)]).unwrap();
        assert_eq!(above_high.tier, UrgencyTier::High);
    }

    #[test]
    fn later_high_alternative_never_downgrades_urgent() {
        let assessment = assess(&[
            result("nevus", 0.9),
            result("melanoma", 0.5),
            result("basal cell carcinoma", 0.45),
        ])
        .unwrap();
        assert_eq!(assessment.tier, UrgencyTier::Urgent);
    }

    #[test]
    fn escalation_never_lowers_primary_tier() {
        let results = [
            result("malignant lesion", 0.7),
            result("nevus", 0.6),
            result("squamous", 0.5),
            result("atypical", 0.45),
        ];
        let assessment = assess(&results).unwrap();
        assert_eq!(assessment.tier, UrgencyTier::Urgent);

        let base = tier_for_label(&assessment.primary.label);
        assert!(assessment.tier >= base);
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = assess(&[]).unwrap_err();
        assert!(matches!(err, TriageError::InvalidInput(_)));
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        assert!(assess(&[result("nevus", 1.2)]).is_err());
        assert!(assess(&[result("nevus", f64::NAN)]).is_err());
    }

    #[test]
    fn assessment_carries_presentation_metadata() {
        let assessment = assess(&[result("squamous cell carcinoma", 0.8)]).unwrap();
        assert_eq!(assessment.tier, UrgencyTier::High);
        assert_eq!(assessment.guidance, UrgencyTier::High.guidance());
        assert_eq!(assessment.color, "#F57C00");
        assert_eq!(assessment.severity_weight, 3);
        assert!(assessment.tier.requires_notification());
        assert!(!UrgencyTier::Normal.requires_notification());
    }
}
