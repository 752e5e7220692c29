use chrono::{DateTime, Utc};

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
        .container { max-width: 600px; margin: 0 auto; padding: 20px; }
        .button { display: inline-block; padding: 12px 24px; background-color: #2f6fed; color: white; text-decoration: none; border-radius: 4px; margin: 20px 0; }
        .note { background-color: #f3f6fb; border-left: 4px solid #2f6fed; padding: 12px; margin: 20px 0; }
        .footer { margin-top: 30px; padding-top: 20px; border-top: 1px solid #ddd; font-size: 12px; color: #666; }
"#;

/// Wrap body paragraphs in the shared HTML frame
fn html_frame(title: &str, body: &str, action_label: &str, link: &str, note: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <style>{style}</style>
</head>
<body>
    <div class="container">
        <h2>{title}</h2>
        {body}
        <a href="{link}" class="button">{action_label}</a>
        <p>Or copy and paste this link into your browser:</p>
        <p style="word-break: break-all; color: #666;">{link}</p>
        <div class="note">{note}</div>
        <div class="footer">
            <p>Sent by Visor</p>
        </div>
    </div>
</body>
</html>"#,
        style = STYLE,
        title = title,
        body = body,
        action_label = action_label,
        link = link,
        note = note,
    )
}

/// Password reset email; returns (text, html)
pub fn password_reset(
    user_name: &str,
    reset_link: &str,
    expires_at: &DateTime<Utc>,
    ip_address: &str,
) -> (String, String) {
    let expires = expires_at.format("%Y-%m-%d %H:%M");

    let text = format!(
        r#"Hi {user_name},

We received a request to reset your Visor password. Open the link below to choose a new one:

{reset_link}

The link expires at {expires} UTC. The request came from {ip_address}.

If you did not ask for this, ignore this email and your password stays unchanged.
"#
    );

    let html = html_frame(
        "Reset your password",
        &format!(
            "<p>Hi {user_name},</p><p>We received a request to reset your Visor password.</p>"
        ),
        "Reset password",
        reset_link,
        &format!(
            "The link expires at <strong>{expires} UTC</strong>. The request came from {ip_address}."
        ),
    );

    (text, html)
}

/// Invitation email; returns (text, html)
pub fn invitation(
    invited_by_name: &str,
    invitation_link: &str,
    role_name: Option<&str>,
    expires_at: &DateTime<Utc>,
) -> (String, String) {
    let expires = expires_at.format("%Y-%m-%d %H:%M");
    let role_text = role_name
        .map(|r| format!(" with the {} role", r))
        .unwrap_or_default();

    let text = format!(
        r#"Hello,

{invited_by_name} invited you to Visor{role_text}.

Open the link below to accept the invitation and create your account:

{invitation_link}

The invitation expires at {expires} UTC. If you were not expecting it, you can ignore this email.
"#
    );

    let html = html_frame(
        "You're invited",
        &format!(
            "<p>Hello,</p><p><strong>{invited_by_name}</strong> invited you to Visor{role_text}.</p>"
        ),
        "Accept invitation",
        invitation_link,
        &format!("The invitation expires at <strong>{expires} UTC</strong>."),
    );

    (text, html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_mentions_role_and_link() {
        let (text, html) = invitation(
            "Ada Admin",
            "https://visor.local/accept-invitation?token=abc",
            Some("editors"),
            &Utc::now(),
        );

        assert!(text.contains("Ada Admin invited you to Visor with the editors role."));
        assert!(text.contains("token=abc"));
        assert!(html.contains("href=\"https://visor.local/accept-invitation?token=abc\""));
    }

    #[test]
    fn test_password_reset_mentions_ip() {
        let (text, html) = password_reset("Jane", "https://x/reset", &Utc::now(), "10.0.0.1");
        assert!(text.contains("10.0.0.1"));
        assert!(html.contains("Reset password"));
    }
}
