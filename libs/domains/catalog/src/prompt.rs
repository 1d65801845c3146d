//! Prompt rendering for styling recommendation comments.

use crate::models::ProductRecord;

const DESCRIPTION_MAX_CHARS: usize = 100;
const UNKNOWN: &str = "Unknown";

/// System persona for the text generator
pub const SYSTEM_PROMPT: &str = "\
You are the AI fashion stylist of Style Matcher.
You recommend products that fit the style the user is looking for and explain why they work well together.

## Role
- A friendly, professional fashion advisor
- Well versed in Korean fashion trends
- Gives practical styling tips

## Response rules
1. Write in natural Korean
2. Describe the style characteristics of each product concretely
3. Suggest outfit combinations (for example \"pairs well with wide denim\")
4. Include occasions the items suit
5. Avoid excessive adjectives and focus on practical advice
6. Keep the answer under 500 characters

## Important
- Only mention what is present in the product information provided
- State brand, material and price exactly as given
- Do not guess information that is not in the data";

/// Render one `[Product n]` section per product, separated by blank lines.
pub fn build_product_context(products: &[ProductRecord]) -> String {
    products
        .iter()
        .enumerate()
        .map(|(i, product)| render_product(i + 1, product))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_product(position: usize, product: &ProductRecord) -> String {
    let name = product
        .name_ko
        .as_deref()
        .filter(|n| !n.is_empty())
        .or_else(|| Some(product.name.as_str()).filter(|n| !n.is_empty()))
        .unwrap_or(UNKNOWN);

    let mut lines = vec![
        format!("[Product {}]", position),
        format!("- Name: {}", name),
        format!("- Brand: {}", product.brand.as_deref().unwrap_or(UNKNOWN)),
    ];

    if let Some(category) = non_empty(&product.category) {
        let category = match non_empty(&product.sub_category) {
            Some(sub) => format!("{}/{}", category, sub),
            None => category.to_string(),
        };
        lines.push(format!("- Category: {}", category));
    }

    lines.push(format!("- Price: {} KRW", format_thousands(product.price)));

    if let Some(color) = non_empty(&product.color) {
        lines.push(format!("- Color: {}", color));
    }
    if !product.style_tags.is_empty() {
        lines.push(format!("- Style: {}", product.style_tags.join(", ")));
    }
    if let Some(material) = non_empty(&product.material) {
        lines.push(format!("- Material: {}", material));
    }
    if let Some(season) = non_empty(&product.season) {
        lines.push(format!("- Season: {}", season));
    }
    if let Some(description) = non_empty(&product.description) {
        lines.push(format!("- Description: {}", truncate_description(description)));
    }

    lines.join("\n")
}

/// Instruction message wrapping the product context.
pub fn build_user_message(product_context: &str, user_query: Option<&str>) -> String {
    let opening = match user_query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => format!("The user searched for '{}' and found the products below.", query),
        None => "Please give styling recommendations for the products below.".to_string(),
    };

    [
        opening.as_str(),
        "",
        product_context,
        "",
        "Please write a styling recommendation comment for these products.",
    ]
    .join("\n")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn truncate_description(description: &str) -> String {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        let truncated: String = description.chars().take(DESCRIPTION_MAX_CHARS).collect();
        format!("{}...", truncated)
    } else {
        description.to_string()
    }
}

/// `1234567` -> `1,234,567`
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
