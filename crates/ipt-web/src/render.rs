//! HTML for the dashboard and its fragments.
//!
//! Every value that came out of a listing or a form is escaped before it is
//! spliced into markup.

use ipt_core::{RuleListing, Table};
use ipt_exec::Overview;
use std::fmt::Write;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn status_error(message: &str) -> String {
    format!(r#"<div class="status error">{}</div>"#, escape(message))
}

pub fn status_success(message: &str) -> String {
    format!(r#"<div class="status success">{}</div>"#, escape(message))
}

/// Rule rows of one chain, each with a delete-by-position button.
pub fn rules_table(table: Table, chain: &str, listing: &RuleListing) -> String {
    let mut html = String::from(
        "<table><tr><th>Num</th><th>Pkts</th><th>Bytes</th><th>Target</th><th>Prot</th>\
         <th>Opt</th><th>In</th><th>Out</th><th>Source</th><th>Destination</th>\
         <th>Details</th><th>Action</th></tr>",
    );

    for row in &listing.rows {
        let cells: [&str; 11] = [
            row.num.as_str(),
            &row.pkts,
            &row.bytes,
            &row.target,
            &row.prot,
            &row.opt,
            row.in_iface.as_deref().unwrap_or(""),
            row.out_iface.as_deref().unwrap_or(""),
            &row.source,
            &row.destination,
            &row.extra,
        ];
        html.push_str("<tr>");
        for cell in cells {
            let _ = write!(html, "<td>{}</td>", escape(cell));
        }
        let _ = write!(
            html,
            r#"<td><form method="POST" action="/delete_rule" style="display: inline;"><input type="hidden" name="table" value="{table}"><input type="hidden" name="chain" value="{chain}"><input type="hidden" name="rule_number" value="{num}"><button type="submit" class="button delete">Delete</button></form></td></tr>"#,
            table = table,
            chain = escape(chain),
            num = escape(&row.num),
        );
    }

    html.push_str("</table>");
    html
}

pub fn nat_rules(output: &str) -> String {
    format!("<pre>{}</pre>", escape(output))
}

/// Everything the index page shows.
pub struct DashboardView<'a> {
    pub chains: &'a [String],
    pub overview: &'a Overview,
    pub rules_table: String,
    pub nat_rules: String,
}

pub fn dashboard(view: &DashboardView<'_>) -> String {
    let mut chain_options = String::new();
    for chain in view.chains {
        let chain = escape(chain);
        let _ = write!(chain_options, r#"<option value="{chain}">{chain}</option>"#);
    }

    let mut custom_rows = String::new();
    for chain in &view.overview.custom_chains {
        let name = escape(&chain.name);
        let _ = write!(
            custom_rows,
            r#"<tr><td>{table}</td><td>{name}</td><td><form method="POST" action="/delete_chain" style="display: inline;"><input type="hidden" name="table" value="{table}"><input type="hidden" name="chain" value="{name}"><button type="submit" class="button delete">Delete</button></form></td></tr>"#,
            table = chain.table,
        );
    }

    let mut policy_rows = String::new();
    for entry in &view.overview.policies {
        let chain = escape(&entry.chain);
        let _ = write!(
            policy_rows,
            r#"<tr><td>{table}</td><td>{chain}</td><td>{policy}</td><td><form method="POST" action="/set_policy"><input type="hidden" name="table" value="{table}"><input type="hidden" name="chain" value="{chain}"><select name="policy"><option value="ACCEPT">ACCEPT</option><option value="DROP">DROP</option><option value="REJECT">REJECT</option></select><button type="submit" class="button">Update</button></form></td></tr>"#,
            table = entry.table,
            policy = escape(&entry.policy),
        );
    }

    DASHBOARD_HTML
        .replace("{{CHAIN_OPTIONS}}", &chain_options)
        .replace("{{RULES_TABLE}}", &view.rules_table)
        .replace("{{CUSTOM_CHAINS}}", &custom_rows)
        .replace("{{NAT_RULES}}", &view.nat_rules)
        .replace("{{POLICIES}}", &policy_rows)
}

const DASHBOARD_HTML: &str = r##"<!DOCTYPE html>
<html>
<head>
    <title>Advanced IPTables Manager</title>
    <meta charset="utf-8">
    <style>
        body { font-family: Arial, sans-serif; margin: 20px; background-color: #f5f5f5; }
        .container { max-width: 1200px; margin: 0 auto; background: white; padding: 20px; border-radius: 8px; box-shadow: 0 0 10px rgba(0,0,0,0.1); }
        .tab { overflow: hidden; border: 1px solid #ccc; background-color: #f1f1f1; border-radius: 4px; }
        .tab button { background-color: inherit; float: left; border: none; outline: none; cursor: pointer; padding: 14px 16px; transition: 0.3s; }
        .tab button:hover { background-color: #ddd; }
        .tab button.active { background-color: #4CAF50; color: white; }
        .tabcontent { display: none; padding: 20px; border: 1px solid #ccc; border-top: none; }
        table { border-collapse: collapse; width: 100%; margin-bottom: 20px; }
        th, td { border: 1px solid #ddd; padding: 12px; text-align: left; }
        th { background-color: #4CAF50; color: white; }
        tr:nth-child(even) { background-color: #f2f2f2; }
        .button { background-color: #4CAF50; color: white; padding: 10px 20px; border: none; border-radius: 4px; cursor: pointer; margin: 5px; }
        .delete { background-color: #f44336; }
        .form-group { margin-bottom: 15px; }
        select, input { padding: 8px; margin: 5px; border-radius: 4px; border: 1px solid #ddd; }
        .status { padding: 10px; margin: 10px 0; border-radius: 4px; }
        .status.success { background-color: #dff0d8; border: 1px solid #d6e9c6; color: #3c763d; }
        .status.error { background-color: #f2dede; border: 1px solid #ebccd1; color: #a94442; }
    </style>
    <script>
        function openTab(evt, tabName) {
            for (const el of document.getElementsByClassName("tabcontent")) {
                el.style.display = "none";
            }
            for (const el of document.getElementsByClassName("tablinks")) {
                el.className = el.className.replace(" active", "");
            }
            document.getElementById(tabName).style.display = "block";
            evt.currentTarget.className += " active";
        }

        function updateRuleDisplay() {
            const table = document.getElementById("table-select").value;
            const chain = document.getElementById("chain-select").value;
            fetch(`/get_rules/${encodeURIComponent(table)}/${encodeURIComponent(chain)}`)
                .then(response => response.json())
                .then(data => {
                    document.getElementById("rules-table").innerHTML =
                        data.html || `<div class="status error">${data.error}</div>`;
                });
        }

        document.addEventListener('DOMContentLoaded', function() {
            document.querySelector('.tablinks').click();
        });
    </script>
</head>
<body>
    <div class="container">
        <h1>Advanced IPTables Manager</h1>

        <div class="tab">
            <button class="tablinks" onclick="openTab(event, 'Rules')">Rules Management</button>
            <button class="tablinks" onclick="openTab(event, 'Chains')">Chains</button>
            <button class="tablinks" onclick="openTab(event, 'NAT')">NAT Configuration</button>
            <button class="tablinks" onclick="openTab(event, 'Policies')">Default Policies</button>
            <button class="tablinks" onclick="openTab(event, 'Save')">Save/Restore</button>
        </div>

        <div id="Rules" class="tabcontent">
            <h2>Manage Rules</h2>
            <div class="form-group">
                <select id="table-select" onchange="updateRuleDisplay()">
                    <option value="filter">Filter</option>
                    <option value="nat">NAT</option>
                    <option value="mangle">Mangle</option>
                    <option value="raw">Raw</option>
                </select>
                <select id="chain-select" onchange="updateRuleDisplay()">
                    {{CHAIN_OPTIONS}}
                </select>
            </div>

            <div id="rules-table">
                {{RULES_TABLE}}
            </div>

            <h3>Add New Rule</h3>
            <form method="POST" action="/add_rule">
                <div class="form-group">
                    <select name="table" required>
                        <option value="filter">Filter</option>
                        <option value="nat">NAT</option>
                        <option value="mangle">Mangle</option>
                        <option value="raw">Raw</option>
                    </select>
                    <select name="chain" required>
                        {{CHAIN_OPTIONS}}
                    </select>
                    <select name="action" required>
                        <option value="ACCEPT">ACCEPT</option>
                        <option value="DROP">DROP</option>
                        <option value="REJECT">REJECT</option>
                        <option value="LOG">LOG</option>
                        <option value="SNAT">SNAT</option>
                        <option value="DNAT">DNAT</option>
                        <option value="MASQUERADE">MASQUERADE</option>
                    </select>
                </div>
                <div class="form-group">
                    <input type="text" name="source_ip" placeholder="Source IP">
                    <input type="text" name="dest_ip" placeholder="Destination IP">
                    <input type="text" name="source_port" placeholder="Source Port">
                    <input type="text" name="dest_port" placeholder="Destination Port">
                    <select name="protocol">
                        <option value="tcp">TCP</option>
                        <option value="udp">UDP</option>
                        <option value="icmp">ICMP</option>
                        <option value="all">All</option>
                    </select>
                </div>
                <div class="form-group">
                    <input type="text" name="to_source" placeholder="To-Source (for SNAT)">
                    <input type="text" name="to_destination" placeholder="To-Destination (for DNAT)">
                    <input type="text" name="in_interface" placeholder="Input Interface">
                    <input type="text" name="out_interface" placeholder="Output Interface">
                </div>
                <button type="submit" class="button">Add Rule</button>
            </form>
        </div>

        <div id="Chains" class="tabcontent">
            <h2>Chain Management</h2>
            <h3>Custom Chains</h3>
            <table>
                <tr><th>Table</th><th>Chain</th><th>Action</th></tr>
                {{CUSTOM_CHAINS}}
            </table>

            <h3>Create New Chain</h3>
            <form method="POST" action="/create_chain">
                <select name="table" required>
                    <option value="filter">Filter</option>
                    <option value="nat">NAT</option>
                    <option value="mangle">Mangle</option>
                    <option value="raw">Raw</option>
                </select>
                <input type="text" name="chain" placeholder="Chain Name" required>
                <button type="submit" class="button">Create Chain</button>
            </form>
        </div>

        <div id="NAT" class="tabcontent">
            <h2>NAT Configuration</h2>
            <h3>Current NAT Rules</h3>
            <div id="nat-rules">
                {{NAT_RULES}}
            </div>

            <h3>Add NAT Rule</h3>
            <form method="POST" action="/add_nat_rule">
                <div class="form-group">
                    <select name="nat_type" required>
                        <option value="SNAT">Source NAT</option>
                        <option value="DNAT">Destination NAT</option>
                        <option value="MASQUERADE">Masquerade</option>
                    </select>
                    <input type="text" name="source" placeholder="Source Address">
                    <input type="text" name="destination" placeholder="Destination Address">
                    <input type="text" name="to_source" placeholder="To-Source Address">
                    <input type="text" name="to_destination" placeholder="To-Destination Address">
                </div>
                <button type="submit" class="button">Add NAT Rule</button>
            </form>
        </div>

        <div id="Policies" class="tabcontent">
            <h2>Default Policies</h2>
            <table>
                <tr><th>Table</th><th>Chain</th><th>Current Policy</th><th>Action</th></tr>
                {{POLICIES}}
            </table>
        </div>

        <div id="Save" class="tabcontent">
            <h2>Save/Restore Rules</h2>
            <form method="POST" action="/save_rules">
                <button type="submit" class="button">Save Current Rules</button>
            </form>

            <h3>Restore Rules</h3>
            <form method="POST" action="/restore_rules" enctype="multipart/form-data">
                <input type="file" name="rules_file" accept=".rules">
                <button type="submit" class="button">Restore Rules</button>
            </form>
        </div>
    </div>
</body>
</html>
"##;
