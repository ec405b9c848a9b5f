/// Grade labels a student can hold. `Grade7` is where automatic promotion stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    Prep,
    Grade1,
    Grade2,
    Grade3,
    Grade4,
    Grade5,
    Grade6,
    Grade7,
}

impl Grade {
    /// Accepts "Prep" and "Grade N" (N in 1..=7), ignoring case and surrounding spaces.
    pub fn parse(label: &str) -> Option<Grade> {
        let t = label.trim().to_ascii_lowercase();
        if t == "prep" {
            return Some(Grade::Prep);
        }
        match t.strip_prefix("grade")?.trim() {
            "1" => Some(Grade::Grade1),
            "2" => Some(Grade::Grade2),
            "3" => Some(Grade::Grade3),
            "4" => Some(Grade::Grade4),
            "5" => Some(Grade::Grade5),
            "6" => Some(Grade::Grade6),
            "7" => Some(Grade::Grade7),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Grade::Prep => "Prep",
            Grade::Grade1 => "Grade 1",
            Grade::Grade2 => "Grade 2",
            Grade::Grade3 => "Grade 3",
            Grade::Grade4 => "Grade 4",
            Grade::Grade5 => "Grade 5",
            Grade::Grade6 => "Grade 6",
            Grade::Grade7 => "Grade 7",
        }
    }

    pub fn next(self) -> Grade {
        match self {
            Grade::Prep => Grade::Grade1,
            Grade::Grade1 => Grade::Grade2,
            Grade::Grade2 => Grade::Grade3,
            Grade::Grade3 => Grade::Grade4,
            Grade::Grade4 => Grade::Grade5,
            Grade::Grade5 => Grade::Grade6,
            Grade::Grade6 => Grade::Grade7,
            // Graduated out of the primary range; nothing beyond this is defined.
            Grade::Grade7 => Grade::Grade7,
        }
    }
}

pub fn next_grade(current: Grade) -> Grade {
    current.next()
}

/// Promotion happens only when the year wraps from Term 4 to Term 1.
pub fn is_promotion_boundary(closing_term_number: i64, new_term_number: i64) -> bool {
    closing_term_number == 4 && new_term_number == 1
}
