use serde::Serialize;

/// One tracked discussion topic. The analyst extracts an answer per topic;
/// readiness means every topic has concrete, non-generic coverage.
#[derive(Debug, Serialize)]
pub struct ReflectionTopic {
    pub id: &'static str,
    pub title: &'static str,
    pub guidance: &'static str,
    pub question_hints: &'static [&'static str],
}

pub const REFLECTION_TOPICS: &[ReflectionTopic] = &[
    ReflectionTopic {
        id: "achievements",
        title: "הישגים ותוצרים",
        guidance: "Concrete deliverables: feature/PR/demo/fix/deploy. Include what was built and evidence.",
        question_hints: &[
            "מה הספקתם לסיים השבוע?",
            "איזה פיצ'ר או תיקון יצא לפרודקשן?",
            "מה התוצר הכי משמעותי מהשבוע?",
        ],
    },
    ReflectionTopic {
        id: "wins",
        title: "מה עבד טוב",
        guidance: "What helped you succeed? Practices, communication, planning. Give one concrete example.",
        question_hints: &[
            "מה עזר לכם להתקדם השבוע?",
            "איזו שיטת עבודה הוכיחה את עצמה?",
            "מה הייתם רוצים להמשיך לעשות?",
        ],
    },
    ReflectionTopic {
        id: "pain_points",
        title: "מה לא עבד",
        guidance: "What went poorly? Misalignment, rework, unclear tasks, bugs. Give one concrete example.",
        question_hints: &[
            "מה היה מתסכל השבוע?",
            "איפה בזבזתם זמן על דברים שאפשר היה למנוע?",
            "מה הייתם עושים אחרת בדיעבד?",
        ],
    },
    ReflectionTopic {
        id: "blockers",
        title: "חסמים",
        guidance: "What blocked progress? Technical, dependencies, communication, time. Include type and impact.",
        question_hints: &[
            "מה עיכב אתכם השבוע?",
            "היו תלויות שחיכיתם להן?",
            "כמה זמן איבדתם בגלל החסם הזה?",
        ],
    },
    ReflectionTopic {
        id: "decisions",
        title: "החלטות חשובות",
        guidance: "Key decision made and why. One decision is enough if concrete.",
        question_hints: &[
            "איזו החלטה חשובה קיבלתם השבוע?",
            "עמדתם בפני דילמה? מה בחרתם ולמה?",
            "מה היו החלופות שוויתרתם עליהן?",
        ],
    },
    ReflectionTopic {
        id: "risks",
        title: "סיכונים לשבוע הבא",
        guidance: "What might fail next week? Add one mitigation idea.",
        question_hints: &[
            "מה עלול להשתבש בשבוע הבא?",
            "יש משהו שמדאיג אתכם קדימה?",
            "איך אפשר להקטין את הסיכון הזה?",
        ],
    },
    ReflectionTopic {
        id: "next_actions",
        title: "פעולות לשבוע הבא",
        guidance: "Exactly 3 concrete actions: what + owner + target (date/week).",
        question_hints: &[
            "מה שלוש המשימות הכי חשובות לשבוע הבא?",
            "מי אחראי על כל משימה?",
            "מתי כל משימה צריכה להסתיים?",
        ],
    },
];
