use monitor_core::AlertEvent;

pub struct EmailTemplate;

impl EmailTemplate {
    pub fn subject(event: &AlertEvent) -> String {
        format!("Price alert for {}", capitalize(&event.asset))
    }

    pub fn body(event: &AlertEvent) -> String {
        let direction = if event.percent_change >= 0.0 {
            "risen"
        } else {
            "fallen"
        };
        format!(
            "The price of {} has {} by {:.2}% since the last sample ({} -> {} {}).",
            event.asset,
            direction,
            event.percent_change.abs(),
            event.previous_price,
            event.current_price,
            event.currency,
        )
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use monitor_core::AlertEvent;

    use super::EmailTemplate;

    fn event(change: f64, current: f64) -> AlertEvent {
        AlertEvent {
            asset: "bitcoin".to_string(),
            previous_price: 100.0,
            current_price: current,
            percent_change: change,
            currency: "usd".to_string(),
        }
    }

    #[test]
    fn subject_capitalizes_the_coin() {
        assert_eq!(
            EmailTemplate::subject(&event(6.0, 106.0)),
            "Price alert for Bitcoin"
        );
    }

    #[test]
    fn body_formats_change_to_two_decimals() {
        let body = EmailTemplate::body(&event(6.0, 106.0));
        assert!(body.contains("risen by 6.00%"), "{body}");
    }

    #[test]
    fn body_quotes_prices_in_the_reference_currency() {
        let body = EmailTemplate::body(&event(6.0, 106.0));
        assert!(body.contains("(100 -> 106 usd)"), "{body}");
    }

    #[test]
    fn body_reports_drops_as_fallen() {
        let body = EmailTemplate::body(&event(-7.5, 92.5));
        assert!(body.contains("fallen by 7.50%"), "{body}");
    }
}
