use crate::config::mail_config::MailConfig;
use crate::domain::ReportingWeek;

pub fn email_subject(week: &ReportingWeek, config: &MailConfig) -> String {
    format!("w-e {} {}", week.message_span("-"), config.report_title)
}

pub fn email_body(week: &ReportingWeek, config: &MailConfig) -> String {
    let mut body = format!(
        "Hi there,\n\nI hope you are doing okay. Please find attached document for my timesheet submitted for {} week.\n\n",
        week.message_span("-")
    );
    if let Some(site) = &config.site {
        body.push_str(&format!("at {}\n\n", site));
    }
    body.push_str(&format!("Regards,\n{}\n", config.sender_name));
    body
}

pub fn chat_message(week: &ReportingWeek) -> String {
    format!(
        "Email for timesheet {} has been sent.",
        week.message_span(" - ")
    )
}
