use crate::domain::grading::round2;

/// An activity's contribution to its parameter: the student's grade (0 when no
/// progress row exists, so missing work counts against the average) and the
/// activity's percentage weight within the parameter.
#[derive(Debug, Clone, Copy)]
pub struct WeightedGrade {
    pub grade: f64,
    pub weight_pct: f64,
}

/// Parameter grade: weighted average of the parameter's activities. Activities
/// with no recorded progress must be passed in with grade 0, not omitted.
pub fn parameter_grade(activities: &[WeightedGrade]) -> f64 {
    let total: f64 = activities.iter().map(|a| a.weight_pct).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let sum: f64 = activities.iter().map(|a| a.grade * a.weight_pct).sum();
    round2(sum / total)
}

/// Course final grade: parameter grades weighted by the parameter's percentage
/// within the course, over a fixed denominator of 100.
pub fn course_final_grade(parameters: &[WeightedGrade]) -> f64 {
    let sum: f64 = parameters.iter().map(|p| p.grade * p.weight_pct).sum();
    round2(sum / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_grade_is_the_weighted_average() {
        let grade = parameter_grade(&[
            WeightedGrade { grade: 4.0, weight_pct: 60.0 },
            WeightedGrade { grade: 2.0, weight_pct: 40.0 },
        ]);
        assert_eq!(grade, 3.2);
    }

    #[test]
    fn missing_work_drags_the_average_down() {
        // Second activity never attempted: contributes grade 0 but keeps its weight.
        let grade = parameter_grade(&[
            WeightedGrade { grade: 5.0, weight_pct: 50.0 },
            WeightedGrade { grade: 0.0, weight_pct: 50.0 },
        ]);
        assert_eq!(grade, 2.5);
    }

    #[test]
    fn empty_parameter_is_zero() {
        assert_eq!(parameter_grade(&[]), 0.0);
        assert_eq!(parameter_grade(&[WeightedGrade { grade: 4.0, weight_pct: 0.0 }]), 0.0);
    }

    #[test]
    fn course_final_grade_over_one_hundred() {
        let grade = course_final_grade(&[
            WeightedGrade { grade: 3.2, weight_pct: 50.0 },
            WeightedGrade { grade: 5.0, weight_pct: 50.0 },
        ]);
        assert_eq!(grade, 4.1);
    }

    #[test]
    fn single_full_weight_parameter_passes_through() {
        // One parameter at weight 100 holding one activity at weight 100, grade 4.
        let param = parameter_grade(&[WeightedGrade { grade: 4.0, weight_pct: 100.0 }]);
        let final_grade = course_final_grade(&[WeightedGrade { grade: param, weight_pct: 100.0 }]);
        assert_eq!(final_grade, 4.0);
    }

    #[test]
    fn underweighted_course_scales_down() {
        // Parameters summing to less than 100 leave headroom unfilled.
        let grade = course_final_grade(&[WeightedGrade { grade: 5.0, weight_pct: 50.0 }]);
        assert_eq!(grade, 2.5);
    }
}
