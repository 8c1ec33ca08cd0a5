use crate::image::Image;
use crate::notice::Notice;
use anyhow::Result;
use std::fs;
use std::path::Path;

/// Write the resolved inventory as a Markdown report.
pub fn generate_markdown_report(image: &Image, output_path: &Path) -> Result<()> {
    fs::write(output_path, format_inventory_markdown(image))?;
    Ok(())
}

/// Write the resolved inventory as JSON.
pub fn generate_json_report(image: &Image, output_path: &Path) -> Result<()> {
    fs::write(output_path, serde_json::to_string_pretty(image)?)?;
    Ok(())
}

fn push_notices(markdown: &mut String, notices: &[Notice]) {
    for notice in notices {
        markdown.push_str(&format!(
            "- **{}** ({}): {}\n",
            notice.level,
            notice.origin,
            notice.message.trim_end()
        ));
    }
}

pub fn format_inventory_markdown(image: &Image) -> String {
    let mut markdown = String::new();

    markdown.push_str(&format!("# Package inventory: {}\n\n", image.origin_ref()));
    if let Some(id) = &image.id {
        markdown.push_str(&format!("- **ID**: `{}`\n", id));
    }
    markdown.push_str(&format!("- **Layers**: {}\n", image.layers.len()));
    markdown.push_str(&format!(
        "- **Packages**: {}\n\n",
        image
            .layers
            .iter()
            .map(|layer| layer.packages.len())
            .sum::<usize>()
    ));

    if !image.notices.is_empty() {
        markdown.push_str("## Notices\n\n");
        push_notices(&mut markdown, &image.notices);
        markdown.push('\n');
    }

    for (index, layer) in image.layers.iter().enumerate() {
        markdown.push_str(&format!("## Layer {}: `{}`\n\n", index + 1, layer.id));

        if layer.packages.is_empty() {
            markdown.push_str("No packages resolved.\n\n");
        } else {
            markdown.push_str("| Package | Version | License | Source URL | Dependencies |\n");
            markdown.push_str("|---------|---------|---------|------------|--------------|\n");
            for pkg in &layer.packages {
                markdown.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    pkg.name,
                    pkg.version.as_deref().unwrap_or(""),
                    pkg.license.as_deref().unwrap_or(""),
                    pkg.src_url.as_deref().unwrap_or(""),
                    pkg.deps.join(", ").replace('|', "\\|")
                ));
            }
            markdown.push('\n');
        }

        let mut layer_notices = layer.notices.clone();
        for pkg in &layer.packages {
            layer_notices.extend(pkg.notices.iter().cloned());
        }
        if !layer_notices.is_empty() {
            markdown.push_str("### Notices\n\n");
            push_notices(&mut markdown, &layer_notices);
            markdown.push('\n');
        }
    }

    markdown
}
