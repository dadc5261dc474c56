//! Deterministic Vietnamese admissions prompt.
//!
//! The template is fixed apart from three injected values: the current
//! year, the concatenated retrieval context, and the verbatim question.
//! Grounding rules live in the prompt itself so the model never invents
//! information beyond the retrieved chunks.

use advisor_core::types::ScoredChunk;
use chrono::{Datelike, Utc};

/// Verbatim no-information answer the model is instructed to return.
pub const FALLBACK_PHRASE: &str = "Xin lỗi, hiện tại tôi không có thông tin về vấn đề này. \
     Bạn có thể liên hệ trực tiếp với phòng Tuyển sinh để được hỗ trợ chi tiết hơn.";

/// Appended once to every generated answer.
pub const REMINDER_FOOTER: &str = "\n\nLưu ý: thông tin mang tính tham khảo. Vui lòng kiểm tra \
     lại trên website chính thức https://tuyensinh.iuh.edu.vn/ hoặc liên hệ trực tiếp với phòng \
     Tuyển sinh để có thông tin chính xác và cập nhật nhất.";

/// Build the single user message sent to the chat model.
pub fn build_prompt(question: &str, context: &[ScoredChunk]) -> String {
    build_prompt_for_year(question, context, Utc::now().year())
}

/// Deterministic variant with an explicit year, used directly by tests.
pub fn build_prompt_for_year(question: &str, context: &[ScoredChunk], year: i32) -> String {
    let context_text = context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Bạn là chatbot tư vấn tuyển sinh của Đại học Công nghiệp TP.HCM. Nhiệm vụ của bạn là \
         cung cấp thông tin chính xác về tuyển sinh năm {year}, thủ tục nhập học và chương trình \
         đào tạo dựa trên dữ liệu cập nhật từ nhà trường.\n\
         1. Trả lời đúng với yêu cầu, đi thẳng vào trọng tâm câu hỏi.\n\
         2. Chỉ cung cấp thông tin từ nguồn dữ liệu chính thức của trường trong phần Ngữ cảnh.\n\
         3. Nếu không có thông tin, trả lời: \"{FALLBACK_PHRASE}\"\n\
         4. Không suy diễn hay thêm thông tin ngoài dữ liệu được cung cấp.\n\
         5. Đối với các câu hỏi về thời hạn hoặc quy định cụ thể, luôn nhắc nhở người hỏi kiểm \
         tra lại thông tin trên website chính thức là: https://tuyensinh.iuh.edu.vn/ hoặc liên hệ \
         trực tiếp với trường bằng điện thoại. Với chi nhánh Hồ Chí Minh qua các số: \
         (028) 3895 5858; (028) 3985 1932; (028) 3985 1917. Chi nhánh Quảng Ngãi: \
         (0255) 625 0075; (0255) 222 2135; 0916 222 135.\n\
         6. Sử dụng ngôn ngữ thân thiện, dễ hiểu và phù hợp với đối tượng là học sinh, phụ huynh \
         quan tâm đến tuyển sinh.\n\
         7. Nếu câu hỏi không rõ ràng, hãy yêu cầu người hỏi cung cấp thêm thông tin để có thể \
         trả lời chính xác hơn.\n\
         8. Nếu được hỏi một ngành có được trường đào tạo không, hãy dựa trên kết quả từ cơ sở \
         dữ liệu: nếu có thì trả lời là có kèm các thông tin liên quan.\n\
         Ngữ cảnh: {context_text}\n\
         Câu hỏi: {question}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::types::Metadata;

    fn chunk(text: &str) -> ScoredChunk {
        ScoredChunk { text: text.to_string(), metadata: Metadata::new(), score: 0.9 }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let ctx = vec![chunk("Học phí ngành CNTT là 15 triệu/năm")];
        let a = build_prompt_for_year("Học phí bao nhiêu?", &ctx, 2026);
        let b = build_prompt_for_year("Học phí bao nhiêu?", &ctx, 2026);
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompt_contains_year_context_and_question() {
        let ctx = vec![chunk("Học phí ngành CNTT là 15 triệu/năm"), chunk("Xét tuyển học bạ")];
        let p = build_prompt_for_year("Học phí ngành CNTT?", &ctx, 2026);
        assert!(p.contains("tuyển sinh năm 2026"));
        assert!(p.contains("Học phí ngành CNTT là 15 triệu/năm"));
        assert!(p.contains("Xét tuyển học bạ"));
        assert!(p.ends_with("Câu hỏi: Học phí ngành CNTT?"));
        assert!(p.contains(FALLBACK_PHRASE));
    }

    #[test]
    fn test_empty_context_yields_empty_ngu_canh() {
        let p = build_prompt_for_year("Có ngành Luật không?", &[], 2026);
        assert!(p.contains("Ngữ cảnh: \n"));
    }
}
