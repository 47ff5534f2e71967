use anyhow::Context as _;
use serde::Serialize;
use tera::{Context, Tera};

/// Email bodies, compiled into the binary.
const TEMPLATES: [(&str, &str); 6] = [
    (
        "emails/welcome.txt",
        include_str!("../../templates/emails/welcome.txt"),
    ),
    (
        "emails/budget_alert.txt",
        include_str!("../../templates/emails/budget_alert.txt"),
    ),
    (
        "emails/goal_reminder.txt",
        include_str!("../../templates/emails/goal_reminder.txt"),
    ),
    (
        "emails/bill_reminder.txt",
        include_str!("../../templates/emails/bill_reminder.txt"),
    ),
    (
        "emails/debt_reminder.txt",
        include_str!("../../templates/emails/debt_reminder.txt"),
    ),
    (
        "emails/invitation.txt",
        include_str!("../../templates/emails/invitation.txt"),
    ),
];

/// Renders email content.
///
/// Every render gets an `app_url` variable so templates can link back to the
/// frontend.
#[derive(Clone)]
pub struct Templates {
    app_url: String,
    tera: Tera,
}

impl Templates {
    pub fn new(app_url: impl Into<String>) -> anyhow::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)
            .context("Failed to compile email templates.")?;

        Ok(Self {
            app_url: app_url.into().trim_end_matches('/').to_owned(),
            tera,
        })
    }

    pub fn render<T: Serialize>(&self, name: &str, values: &T) -> anyhow::Result<String> {
        let mut context = Context::from_serialize(values)
            .with_context(|| format!("Failed to build context for {}.", name))?;
        context.insert("app_url", &self.app_url);

        self.tera
            .render(name, &context)
            .with_context(|| format!("Failed to render {}.", name))
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_with_app_url() {
        let templates = Templates::new("https://app.example.com/").unwrap();

        let content = templates
            .render(
                "emails/welcome.txt",
                &json!({ "name": "Sam", "account": "Cash" }),
            )
            .unwrap();

        assert!(content.contains("Hi Sam,"));
        assert!(content.contains("\"Cash\" account"));
        assert!(content.contains("https://app.example.com to get started"));
    }

    #[test]
    fn goal_reminder_mentions_due_today() {
        let templates = Templates::new("http://localhost").unwrap();

        let content = templates
            .render(
                "emails/goal_reminder.txt",
                &json!({
                    "name": "Sam",
                    "goal": "Bike",
                    "days_left": 0,
                    "target_date": "2024-05-01",
                    "saved": "10.00",
                    "target": "20.00",
                    "percent": 50,
                    "required_monthly": null,
                }),
            )
            .unwrap();

        assert!(content.contains("Today is the target date for your goal \"Bike\"."));
    }
}
