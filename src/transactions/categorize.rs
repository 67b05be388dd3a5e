/// Keyword table, checked in declaration order; the first category with a
/// keyword contained in the description wins.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "food",
        &[
            "restaurant", "food", "pizza", "burger", "coffee", "lunch", "dinner", "breakfast",
            "cafe", "snack", "meal", "grocery", "groceries", "supermarket",
        ],
    ),
    (
        "transport",
        &[
            "uber", "lyft", "taxi", "bus", "train", "metro", "fuel", "gas", "petrol", "diesel",
            "parking", "toll", "flight", "airline",
        ],
    ),
    (
        "shopping",
        &[
            "amazon", "flipkart", "mall", "clothes", "shoes", "electronics", "gadget", "fashion",
            "store", "shop",
        ],
    ),
    (
        "entertainment",
        &[
            "movie", "netflix", "spotify", "concert", "game", "theatre", "park", "club", "party",
            "subscription",
        ],
    ),
    (
        "health",
        &[
            "hospital", "doctor", "medicine", "pharmacy", "gym", "fitness", "yoga", "medical",
            "dental", "insurance",
        ],
    ),
    (
        "utilities",
        &[
            "electricity", "water", "internet", "phone", "mobile", "recharge", "bill", "rent",
            "maintenance",
        ],
    ),
    (
        "education",
        &[
            "course", "book", "tuition", "school", "college", "university", "class", "training",
            "certification",
        ],
    ),
    (
        "salary",
        &[
            "salary", "paycheck", "wage", "bonus", "stipend", "freelance", "payment", "commission",
        ],
    ),
    (
        "investment",
        &[
            "stock", "mutual fund", "sip", "dividend", "interest", "investment", "crypto",
            "returns",
        ],
    ),
];

pub const FALLBACK_CATEGORY: &str = "other";

/// Derives a category from free text by case-insensitive substring match.
pub fn auto_categorize(description: &str) -> &'static str {
    let lower = description.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(FALLBACK_CATEGORY)
}
