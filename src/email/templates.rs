//! # 邮件模板

/// 验证码邮件 HTML
#[must_use]
pub fn verification_code_html(code: &str, expire_minutes: u64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>LexVeritas Verification</title>
</head>
<body style="margin:0;padding:0;font-family:-apple-system,'Segoe UI',Roboto,Arial,sans-serif;background:#f4f7f6;color:#333;">
    <table role="presentation" style="width:100%;border-collapse:collapse;">
        <tr>
            <td align="center" style="padding:40px 0;">
                <table role="presentation" style="width:100%;max-width:600px;background:#fff;border-radius:12px;border:1px solid #e1e4e8;">
                    <tr>
                        <td style="background:#111;padding:30px 40px;">
                            <h1 style="color:#fff;margin:0;font-size:24px;">LexVeritas</h1>
                        </td>
                    </tr>
                    <tr>
                        <td style="padding:40px;">
                            <h2 style="margin:0 0 24px;font-size:20px;">邮箱验证</h2>
                            <p style="font-size:15px;line-height:1.6;color:#555;">您好，请在验证页面输入下方的验证码：</p>
                            <div style="background:#f0f7ff;border-left:4px solid #0056b3;padding:25px;margin:30px 0;text-align:center;">
                                <span style="font-family:'Courier New',monospace;font-size:32px;font-weight:700;color:#0056b3;letter-spacing:4px;">{code}</span>
                            </div>
                            <p style="font-size:14px;line-height:1.6;color:#666;">
                                该验证码将在 <strong>{expire_minutes} 分钟</strong> 后失效。<br>
                                如果这不是您的操作，请忽略此邮件。
                            </p>
                        </td>
                    </tr>
                    <tr>
                        <td style="background:#f8f9fa;padding:24px 40px;text-align:center;border-top:1px solid #eee;">
                            <p style="margin:0;font-size:12px;color:#999;">此为系统自动发送邮件，请勿回复。</p>
                        </td>
                    </tr>
                </table>
            </td>
        </tr>
    </table>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_embeds_code_and_expiry() {
        let html = verification_code_html("482913", 5);
        assert!(html.contains("482913"));
        assert!(html.contains("5 分钟"));
    }
}
