use crate::domain::model::{Instance, InstanceView};
use crate::utils::error::Result;

/// Numbered table of instances, ids are 1-based as used by the manage menu.
pub fn format_table(instances: &[Instance]) -> String {
    let mut table = format!(
        "{:<4}{:<16}{:<12}{:<18}{}",
        "#)", "Name", "Port", "Network", "Service"
    );
    for (idx, instance) in instances.iter().enumerate() {
        table.push('\n');
        table.push_str(&format!(
            "{:<4}{:<16}{:<12}{:<18}{}",
            format!("{})", idx + 1),
            instance.name,
            format!("{}/{}", instance.port, instance.protocol),
            instance.network.to_string(),
            instance.service_name()
        ));
    }
    table
}

pub fn format_json(instances: &[Instance]) -> Result<String> {
    let views: Vec<InstanceView<'_>> = instances.iter().map(InstanceView::from).collect();
    Ok(serde_json::to_string_pretty(&views)?)
}
